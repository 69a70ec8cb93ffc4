use thiserror::Error;

/// Result type local to tabflow-io.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record at line {line}: {msg}")]
    Malformed { line: u64, msg: String },

    #[error(transparent)]
    Core(#[from] tabflow_core::Error),
}

/// Sources surface their failures through the core error type, since the
/// `Table` contract is defined there.
impl From<Error> for tabflow_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Core(inner) => inner,
            Error::Io(io) => tabflow_core::Error::Io(io),
            other => tabflow_core::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        }
    }
}
