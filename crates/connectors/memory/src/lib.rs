//! A row producer over tables held in memory.
//!
//! Honors the page window and modulo key ranges the same way a database
//! would, which makes it usable for local runs and for exercising cursors in
//! tests. Connection and query failures can be injected per source.

use futures::stream::{self, StreamExt};
use multiscan_common::{DataSource, Error, Result};
use multiscan_worker::{PagedQuery, QueryWindow, RowCursor, RowProducer};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// One string per column.
pub type Row = Vec<String>;

#[derive(Debug, Clone)]
struct MemoryTable {
    rows: Vec<Row>,
    /// Column holding the integer key used for key ranges.
    key_column: usize,
}

/// A page query the producer ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedQuery {
    pub url: String,
    pub table: String,
    pub sql: String,
    pub window: QueryWindow,
    pub rows: usize,
}

#[derive(Debug, Default)]
pub struct MemoryProducer {
    tables: HashMap<(String, String), MemoryTable>,
    failing_urls: HashSet<String>,
    /// Table name to the first offset whose query fails.
    failing_queries: HashMap<String, u64>,
    live_sessions: Arc<AtomicUsize>,
    sessions_opened: AtomicUsize,
    executed: Mutex<Vec<ExecutedQuery>>,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table keyed on its first column.
    pub fn with_table(self, url: &str, table: &str, rows: Vec<Row>) -> Self {
        self.with_keyed_table(url, table, rows, 0)
    }

    pub fn with_keyed_table(
        mut self,
        url: &str,
        table: &str,
        rows: Vec<Row>,
        key_column: usize,
    ) -> Self {
        self.tables.insert(
            (url.to_string(), table.to_string()),
            MemoryTable { rows, key_column },
        );
        self
    }

    /// Makes opening a session against `url` fail.
    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    /// Makes page queries on `table` fail once the offset reaches `offset`.
    pub fn with_failing_query(mut self, table: &str, offset: u64) -> Self {
        self.failing_queries.insert(table.to_string(), offset);
        self
    }

    /// Sessions currently open.
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    /// Sessions opened over the producer's lifetime.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.executed.lock().clone()
    }

    fn select(&self, url: &str, source: &DataSource, window: &QueryWindow) -> Result<Vec<Row>> {
        let table = self
            .tables
            .get(&(url.to_string(), source.table.clone()))
            .ok_or_else(|| {
                Error::query(format!("relation '{}' does not exist at {}", source.table, url))
            })?;

        let mut selected = Vec::new();
        for row in &table.rows {
            if let Some(range) = &window.filter {
                let [modulus, remainder] = range.values() else {
                    return Err(Error::query(format!(
                        "expected 2 filter params, got {}",
                        range.values().len()
                    )));
                };
                let key = row
                    .get(table.key_column)
                    .and_then(|k| k.parse::<i64>().ok())
                    .ok_or_else(|| {
                        Error::query(format!(
                            "key column {} of '{}' is not an integer",
                            table.key_column, source.table
                        ))
                    })?;
                let bucket = key.checked_rem_euclid(*modulus).ok_or_else(|| {
                    Error::query(format!(
                        "invalid modulus {} for key {} of '{}'",
                        modulus, key, source.table
                    ))
                })?;
                if bucket != *remainder {
                    continue;
                }
            }
            selected.push(row.clone());
        }

        Ok(selected
            .into_iter()
            .skip(window.offset as usize)
            .take(window.page_size as usize)
            .collect())
    }
}

/// An open session. Dropping it releases it.
#[derive(Debug)]
pub struct MemorySession {
    url: String,
    live: Arc<AtomicUsize>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemoryRows {
    rows: stream::Iter<std::vec::IntoIter<Row>>,
}

#[async_trait::async_trait]
impl RowCursor for MemoryRows {
    type Row = Row;

    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next().await)
    }
}

#[async_trait::async_trait]
impl RowProducer for MemoryProducer {
    type Row = Row;
    type Session = MemorySession;

    async fn open_session(&self, source: &DataSource) -> Result<MemorySession> {
        if self.failing_urls.contains(&source.url) {
            return Err(Error::resource(format!("connection to {} refused", source.url)));
        }
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            url: source.url.clone(),
            live: self.live_sessions.clone(),
        })
    }

    async fn execute(
        &self,
        session: &mut MemorySession,
        source: &DataSource,
        query: &PagedQuery,
    ) -> Result<Box<dyn RowCursor<Row = Row>>> {
        if let Some(offset) = self.failing_queries.get(&source.table) {
            if query.window.offset >= *offset {
                return Err(Error::query(format!(
                    "query on '{}' at offset {} failed",
                    source.table, query.window.offset
                )));
            }
        }

        let rows = self.select(&session.url, source, &query.window)?;
        trace!(table = %source.table, offset = query.window.offset, rows = rows.len(), "memory page");
        self.executed.lock().push(ExecutedQuery {
            url: session.url.clone(),
            table: source.table.clone(),
            sql: query.sql.clone(),
            window: query.window.clone(),
            rows: rows.len(),
        });

        Ok(Box::new(MemoryRows {
            rows: stream::iter(rows),
        }))
    }
}

/// Rows `[i, "<prefix>-i"]` for `i` in `0..count`.
pub fn numbered_rows(prefix: &str, count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| vec![i.to_string(), format!("{}-{}", prefix, i)])
        .collect()
}
