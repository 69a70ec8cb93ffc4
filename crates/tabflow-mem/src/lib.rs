#![forbid(unsafe_code)]
//! tabflow-mem: spill manager for external sorting.
//!
//! Sorted runs are written to private temp files as a sequence of framed,
//! optionally compressed blocks and read back through streaming cursors. A
//! run file is deleted when its last handle is dropped, so abandoning an
//! iteration releases the disk space it used.

pub mod error;
pub mod spill;

pub use error::{Error, Result};
pub use spill::{Codec, RunFile, RunReader, SpillManager};
