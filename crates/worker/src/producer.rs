use crate::query::PagedQuery;
use multiscan_common::{DataSource, Result};

/// Forward-only, read-only rows of one executed page.
#[async_trait::async_trait]
pub trait RowCursor: Send {
    type Row: Send;

    /// Returns the next row, or `None` once the page is drained.
    async fn next_row(&mut self) -> Result<Option<Self::Row>>;
}

/// Executes paged queries against a data source.
///
/// A session is opened per source and dropped when the cursor is done with
/// that source, so implementations release connections in `Drop`.
#[async_trait::async_trait]
pub trait RowProducer: Send + Sync {
    type Row: Send;
    type Session: Send;

    /// Acquires whatever connection or session reading `source` needs.
    /// Failures are reported as `Error::Resource`.
    async fn open_session(&self, source: &DataSource) -> Result<Self::Session>;

    /// Runs one page query. Failures are reported as `Error::Query`.
    async fn execute(
        &self,
        session: &mut Self::Session,
        source: &DataSource,
        query: &PagedQuery,
    ) -> Result<Box<dyn RowCursor<Row = Self::Row>>>;
}
