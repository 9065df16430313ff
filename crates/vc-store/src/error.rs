use vc_types::PollId;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record that must already exist is missing (e.g. saving an unknown poll).
    #[error("poll not found: {0}")]
    PollNotFound(PollId),

    /// The record would violate a storage invariant.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The backend is unreachable, timed out, or its lock was poisoned.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Unavailable(format!("{what} lock poisoned"))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
