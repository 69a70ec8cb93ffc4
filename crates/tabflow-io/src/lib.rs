#![forbid(unsafe_code)]
//! tabflow-io: boundary collaborators for tabflow pipelines.
//!
//! - Sources: [`CsvSource`] (delimited text) and [`JsonlSource`] (a stream of
//!   JSON-encoded records). Both are re-iterable `Table`s that reopen their
//!   file on every pass.
//! - Sinks: [`write_csv`] and [`write_jsonl`] drain any `Table`.
//! - Checksums used for cache invalidation: [`Sha256Sum`], [`Blake3Sum`]
//!   and [`StatSum`].

pub mod checksum;
pub mod error;
pub mod readers;
pub mod writers;

pub use checksum::{Blake3Sum, Checksum, Sha256Sum, StatSum};
pub use error::{Error, Result};
pub use readers::csv::{CsvDialect, CsvSource};
pub use readers::jsonl::JsonlSource;
pub use writers::csv::{write_csv, CsvWriter};
pub use writers::jsonl::{write_jsonl, JsonlWriter};
