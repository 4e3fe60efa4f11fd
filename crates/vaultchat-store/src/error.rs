use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write targeted a document that does not exist.
    #[error("document not found")]
    NotFound,

    /// SQLite error from the persistent backend.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend cannot be reached at all. Callers treat this as fatal
    /// rather than as an empty result.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// True when the whole backend is gone, as opposed to a single
    /// operation failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Poisoned)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
