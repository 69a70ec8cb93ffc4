//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::field::{Field, KeySpec, SortOrder};
pub use crate::hash::{Fingerprint, Hash256};
pub use crate::record::Record;
pub use crate::sortkey::{KeyComparator, SortKey};
pub use crate::table::{Header, MemTable, Row, RowIter, SharedTable, Table};
pub use crate::value::{Kind, Value};
pub use crate::row;
