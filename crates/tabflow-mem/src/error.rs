use thiserror::Error;

/// Result type local to tabflow-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("spill storage error: {0}")]
    Storage(String),

    #[error("unsupported codec: {0}")]
    CodecUnsupported(&'static str),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("checksum mismatch in {0}")]
    ChecksumMismatch(String),
}

impl Error {
    pub(crate) fn io(context: &str, e: std::io::Error) -> Self {
        Error::Storage(format!("{context}: {e}"))
    }
}
