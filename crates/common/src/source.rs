use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a single source descriptor.
///
/// Key-range clones of the same table carry different ids so they can be
/// tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        SourceId(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque parameters narrowing a source to one key range.
///
/// Produced by a key-range generator and forwarded untouched to the row
/// producer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams(Vec<i64>);

impl FilterParams {
    pub fn new(values: Vec<i64>) -> Self {
        FilterParams(values)
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

/// One source table plus the credentials needed to read it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default)]
    pub id: SourceId,
    pub url: String,
    pub username: String,
    pub password: String,
    pub table: String,
    /// Columns to read. Empty means all columns.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub split_by_key: bool,
    /// Only set when `split_by_key` is true.
    #[serde(default)]
    pub filter_params: Option<FilterParams>,
}

impl DataSource {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            id: SourceId::new(),
            url: url.into(),
            username: username.into(),
            password: password.into(),
            table: table.into(),
            columns: Vec::new(),
            split_by_key: false,
            filter_params: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Copies this descriptor into a new, independent source restricted to
    /// the key range described by `params`.
    ///
    /// The clone gets a fresh identity.
    pub fn key_range_clone(&self, params: FilterParams) -> DataSource {
        DataSource {
            id: SourceId::new(),
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            table: self.table.clone(),
            columns: self.columns.clone(),
            split_by_key: true,
            filter_params: Some(params),
        }
    }

    /// Filter parameters to apply when querying, if this source is key split.
    pub fn key_range(&self) -> Option<&FilterParams> {
        if self.split_by_key {
            self.filter_params.as_ref()
        } else {
            None
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("split_by_key", &self.split_by_key)
            .field("filter_params", &self.filter_params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_range_clone_is_independent() {
        let source = DataSource::new("mem://db1", "reader", "secret", "orders")
            .with_columns(vec!["id".to_string(), "amount".to_string()]);
        let clone = source.key_range_clone(FilterParams::new(vec![3, 1]));

        assert_ne!(clone.id, source.id);
        assert_eq!(clone.table, source.table);
        assert_eq!(clone.columns, source.columns);
        assert!(clone.split_by_key);
        assert_eq!(clone.key_range(), Some(&FilterParams::new(vec![3, 1])));

        assert!(!source.split_by_key);
        assert_eq!(source.key_range(), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let source = DataSource::new("mem://db1", "reader", "hunter2", "orders");
        let rendered = format!("{:?}", source);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("orders"));
    }
}
