use crate::error::{Error, Result};
use crate::source::DataSource;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A single source table as it appears in the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub url: String,
    pub table: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReaderSettings {
    pub num_partitions: usize,
    #[serde(default)]
    pub split_key: Option<String>,
    #[serde(default)]
    pub where_clause: Option<String>,
    /// Default column list for sources that don't specify their own.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Default credentials for sources that don't specify their own.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub fetch_size: u32,
    #[serde(default)]
    pub query_timeout_secs: u64,
    pub sources: Vec<SourceSettings>,
}

fn default_page_size() -> u64 {
    5000
}

/// Options a paged cursor needs from the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub page_size: u64,
    /// Advisory fetch size for the row producer. Zero leaves it to the driver.
    pub fetch_size: u32,
    pub query_timeout: Option<Duration>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fetch_size: 0,
            query_timeout: None,
        }
    }
}

impl ReaderSettings {
    /// Loads settings from the file named by `MULTISCAN_CONFIG_PATH`, with
    /// `MULTISCAN_*` environment variables layered on top.
    pub fn new() -> Result<Self> {
        let config_file_path = std::env::var("MULTISCAN_CONFIG_PATH")
            .unwrap_or_else(|_| "config/multiscan.toml".to_string());

        let s = ::config::Config::builder()
            .add_source(::config::File::with_name(&config_file_path).required(true))
            .add_source(
                ::config::Environment::with_prefix("MULTISCAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let settings: ReaderSettings = s.try_deserialize()?;
        settings.validate()?;
        debug!(
            path = %config_file_path,
            partitions = settings.num_partitions,
            sources = settings.sources.len(),
            "loaded reader settings"
        );
        Ok(settings)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let s = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;
        let settings: ReaderSettings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(Error::configuration("num_partitions must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(Error::configuration("page_size must be at least 1"));
        }
        if self.sources.is_empty() {
            return Err(Error::configuration("at least one source is required"));
        }
        Ok(())
    }

    /// The split key, with an empty string treated as absent.
    pub fn split_key(&self) -> Option<&str> {
        self.split_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Builds the source descriptors, applying the global credentials and
    /// column list where a source doesn't override them.
    pub fn data_sources(&self) -> Vec<DataSource> {
        self.sources
            .iter()
            .map(|s| {
                let columns = s.columns.clone().unwrap_or_else(|| self.columns.clone());
                DataSource::new(
                    s.url.clone(),
                    s.username.clone().unwrap_or_else(|| self.username.clone()),
                    s.password.clone().unwrap_or_else(|| self.password.clone()),
                    s.table.clone(),
                )
                .with_columns(columns)
            })
            .collect()
    }

    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            page_size: self.page_size,
            fetch_size: self.fetch_size,
            query_timeout: (self.query_timeout_secs > 0)
                .then(|| Duration::from_secs(self.query_timeout_secs)),
        }
    }
}
