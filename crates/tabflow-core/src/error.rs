use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A fingerprint was requested of a table that cannot produce one.
    /// Callers treat this as "proceed without caching".
    #[error("table is uncacheable: {0}")]
    Uncacheable(String),

    /// A row-level transform could not produce a required value.
    #[error("transform error: {0}")]
    Transform(String),

    /// A field selector did not resolve against the header encountered.
    #[error("invalid field: {0}")]
    FieldNotFound(String),

    /// Mutually exclusive or otherwise invalid operator parameters.
    #[error("invalid specification: {0}")]
    Spec(String),

    /// Sort spill failures (mapped from the spill manager).
    #[error("spill error: {0}")]
    Spill(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn is_uncacheable(&self) -> bool {
        matches!(self, Error::Uncacheable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
