//! Core types for tabflow: values and their sortable order, the `Table`
//! contract, field/key selectors, fingerprints and engine configuration.
//!
//! This crate performs no I/O.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod field;
pub mod hash;
pub mod prelude;
pub mod record;
pub mod sortkey;
pub mod table;
pub mod value;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use field::{Field, KeySpec, SortOrder};
pub use hash::{Fingerprint, Hash256};
pub use record::Record;
pub use sortkey::{KeyComparator, SortKey};
pub use table::{Header, MemTable, Row, RowIter, SharedTable, Table};
pub use value::Value;
