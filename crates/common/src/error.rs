use thiserror::Error;

use sqlparser::parser::ParserError;

/// Unified error type for Multiscan crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid partition/split-key combination or invalid settings. Only ever
    /// raised before any partition starts reading.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Failed to acquire a connection or session for a source.
    #[error("Resource error: {0}")]
    Resource(String),
    /// Query construction, execution or row decoding failed.
    #[error("Query error: {0}")]
    Query(String),
    #[error("Failed to load settings")]
    Settings(#[from] ::config::ConfigError),
    #[error("SQL parsing error: {0}")]
    SqlParser(#[from] ParserError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Error::Resource(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Error::Query(msg.into())
    }

    /// Returns true for errors that are raised while planning, as opposed to
    /// errors from reading a partition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Settings(_) | Error::SqlParser(_)
        )
    }
}
