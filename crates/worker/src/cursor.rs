//! Multi-source paged cursor driven by a single worker.

use crate::producer::{RowCursor, RowProducer};
use crate::query::{PagedQuery, QueryBuilder, QueryWindow};
use bitvec::vec::BitVec;
use multiscan_common::{DataSource, Error, PageOptions, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No source is open. The next page request opens the first unfinished
    /// source.
    AwaitingSource,
    /// A source is open and pages are read from it.
    Paging,
    /// Every source in the partition is finished.
    AllExhausted,
    /// A source or query failed. The cursor can't be used any more.
    Failed,
    /// Closed by the caller before every source was read.
    Closed,
}

struct OpenSource<S, R> {
    index: usize,
    session: S,
    page: Option<Box<dyn RowCursor<Row = R>>>,
}

/// Reads every source of one partition, one bounded page at a time.
///
/// Driven through `reached_end` and `produce_next`:
///
/// ```text
/// while !cursor.reached_end().await? {
///     if let Some(row) = cursor.produce_next().await? { ... }
/// }
/// ```
///
/// A source is only marked finished when a page query for it returns no rows.
/// Draining the rows of a page just makes the next `reached_end` ask for the
/// following page of the same source.
pub struct PagedSourceCursor<P: RowProducer> {
    partition: usize,
    producer: Arc<P>,
    builder: Arc<dyn QueryBuilder>,
    options: PageOptions,
    sources: Vec<DataSource>,
    finished: BitVec,
    current: Option<OpenSource<P::Session, P::Row>>,
    offset: u64,
    /// Lookahead row, present iff there are more rows.
    next: Option<P::Row>,
    state: CursorState,
}

impl<P: RowProducer> PagedSourceCursor<P> {
    /// Fails with a configuration error if `options.page_size` is zero, since
    /// an empty page is what marks a source finished.
    pub fn new(
        partition: usize,
        sources: Vec<DataSource>,
        producer: Arc<P>,
        builder: Arc<dyn QueryBuilder>,
        options: PageOptions,
    ) -> Result<Self> {
        if options.page_size == 0 {
            return Err(Error::configuration(format!(
                "page size for partition {} must be at least 1",
                partition
            )));
        }
        let finished = BitVec::repeat(false, sources.len());
        Ok(Self {
            partition,
            producer,
            builder,
            options,
            sources,
            finished,
            current: None,
            offset: 0,
            next: None,
            state: CursorState::AwaitingSource,
        })
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    /// Index of the source currently being read.
    pub fn current_source(&self) -> Option<usize> {
        self.current.as_ref().map(|c| c.index)
    }

    pub fn is_finished(&self, index: usize) -> bool {
        self.finished.get(index).map(|b| *b).unwrap_or(false)
    }

    pub fn finished_count(&self) -> usize {
        self.finished.count_ones()
    }

    /// Returns true once every source of the partition has been read.
    ///
    /// When the open page is drained this requests the next page of the
    /// current source, skipping over sources that turn out to be empty.
    /// Calling it again before consuming a row has no further effect.
    pub async fn reached_end(&mut self) -> Result<bool> {
        match self.state {
            CursorState::AllExhausted | CursorState::Closed => return Ok(true),
            CursorState::Failed => return Err(self.failed_error()),
            CursorState::AwaitingSource | CursorState::Paging => {}
        }

        if self.next.is_none() {
            if self.current.is_some() {
                self.offset += self.options.page_size;
            }
            if let Err(e) = self.open_next_page().await {
                return Err(self.fail(e));
            }
        }

        Ok(self.next.is_none())
    }

    /// Returns the next row, or `None` if there is no row available. Callers
    /// check `reached_end` first.
    pub async fn produce_next(&mut self) -> Result<Option<P::Row>> {
        if self.state == CursorState::Failed {
            return Err(self.failed_error());
        }
        let Some(row) = self.next.take() else {
            return Ok(None);
        };
        if let Err(e) = self.advance().await {
            return Err(self.fail(e));
        }
        Ok(Some(row))
    }

    /// Releases the open source, if any. Finished flags are left untouched and
    /// the cursor reports its end from now on, unless it already failed.
    pub fn close(&mut self) {
        if let Some(current) = self.current.take() {
            debug!(
                partition = self.partition,
                table = %self.sources[current.index].table,
                "closing source"
            );
        }
        self.next = None;
        if !matches!(self.state, CursorState::AllExhausted | CursorState::Failed) {
            self.state = CursorState::Closed;
        }
    }

    /// Releases the open source and moves to `Failed`.
    fn fail(&mut self, e: Error) -> Error {
        warn!(partition = self.partition, error = %e, "partition cursor failed");
        self.current = None;
        self.next = None;
        self.state = CursorState::Failed;
        e
    }

    /// Opens the first unfinished source. Returns false if there is none.
    async fn open_next_source(&mut self) -> Result<bool> {
        let Some(index) = self.finished.first_zero() else {
            info!(partition = self.partition, "all sources exhausted");
            self.state = CursorState::AllExhausted;
            self.next = None;
            return Ok(false);
        };

        let source = &self.sources[index];
        let session = self.producer.open_session(source).await?;
        info!(
            partition = self.partition,
            url = %source.url,
            table = %source.table,
            "opened source"
        );

        self.current = Some(OpenSource {
            index,
            session,
            page: None,
        });
        self.offset = 0;
        self.state = CursorState::Paging;
        Ok(true)
    }

    /// Opens the page at the current offset. If it is empty, the source is
    /// marked finished and the following sources are tried in order until one
    /// yields a row or none are left.
    async fn open_next_page(&mut self) -> Result<()> {
        loop {
            if self.current.is_none() && !self.open_next_source().await? {
                return Ok(());
            }
            let Some(current) = self.current.as_mut() else {
                return Ok(());
            };
            current.page = None;

            let source = &self.sources[current.index];
            let window = QueryWindow {
                offset: self.offset,
                page_size: self.options.page_size,
                filter: source.key_range().cloned(),
            };
            let bound = self.builder.build(source, &window)?;
            let query = PagedQuery {
                sql: bound.sql,
                params: bound.params,
                window,
                fetch_size: self.options.fetch_size,
                query_timeout: self.options.query_timeout,
            };
            debug!(
                partition = self.partition,
                sql = %query.sql,
                params = ?query.params,
                "executing page query"
            );

            let mut rows = self
                .producer
                .execute(&mut current.session, source, &query)
                .await?;
            match rows.next_row().await? {
                Some(row) => {
                    current.page = Some(rows);
                    self.next = Some(row);
                    return Ok(());
                }
                None => {
                    drop(rows);
                    self.finish_current();
                }
            }
        }
    }

    /// Moves the lookahead to the next row of the open page.
    async fn advance(&mut self) -> Result<()> {
        let Some(current) = self.current.as_mut() else {
            self.next = None;
            return Ok(());
        };
        let Some(page) = current.page.as_mut() else {
            self.next = None;
            return Ok(());
        };

        self.next = page.next_row().await?;
        if self.next.is_none() {
            current.page = None;
        }
        Ok(())
    }

    fn finish_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.finished.set(current.index, true);
            info!(
                partition = self.partition,
                table = %self.sources[current.index].table,
                offset = self.offset,
                "finished source"
            );
        }
        self.offset = 0;
        self.next = None;
        self.state = CursorState::AwaitingSource;
    }

    fn failed_error(&self) -> Error {
        Error::query(format!(
            "cursor for partition {} failed earlier and can't be read",
            self.partition
        ))
    }
}
