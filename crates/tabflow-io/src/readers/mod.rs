//! Re-iterable file-backed sources.

pub mod csv;
pub mod jsonl;
