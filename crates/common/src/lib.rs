//! Common crate
//!
//! Source descriptors, reader settings, logging and error handling shared by
//! the Multiscan planner and workers.
//!
//! # Example
//! ```rust
//! use multiscan_common::{DataSource, FilterParams};
//! let source = DataSource::new("mem://db1", "reader", "secret", "orders");
//! let clone = source.key_range_clone(FilterParams::new(vec![2, 0]));
//! assert!(clone.split_by_key);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod source;

pub use config::{PageOptions, ReaderSettings, SourceSettings};
pub use error::{Error, Result};
pub use source::{DataSource, FilterParams, SourceId};
