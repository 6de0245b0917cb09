//! Worker crate
//!
//! Each worker drives one [`PagedSourceCursor`] over the sources of its
//! partition, pulling rows page by page from a [`RowProducer`].

pub mod cursor;
pub mod producer;
pub mod query;

pub use cursor::{CursorState, PagedSourceCursor};
pub use producer::{RowCursor, RowProducer};
pub use query::{
    BoundQuery, GenericQueryBuilder, PageSyntax, PagedQuery, ParamStyle, QueryBuilder, QueryWindow,
};
