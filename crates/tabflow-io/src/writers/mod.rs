//! Streaming sinks.

pub mod csv;
pub mod jsonl;
