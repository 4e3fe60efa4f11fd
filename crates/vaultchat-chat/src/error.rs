use thiserror::Error;

use vaultchat_store::StoreError;

/// Errors surfaced by the chat coordination service.
#[derive(Error, Debug)]
pub enum ChatError {
    /// No session is active. Detected locally, before any backend call.
    #[error("no authenticated user")]
    NotAuthenticated,

    /// The caller passed something unusable (self-chat, empty message).
    /// Detected locally, before any backend call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record required by the operation is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The storage collaborator failed.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// A multi-step write failed after some writes already landed. There
    /// is no compensating rollback; the caller decides what to retry.
    #[error("partially committed write: {0}")]
    PartialWrite(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
