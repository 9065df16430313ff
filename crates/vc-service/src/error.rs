use std::fmt;

use thiserror::Error;
use vc_ledger::LedgerError;
use vc_store::StoreError;

/// Why a cast was refused although every referenced record exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Poll inactive, or the current time is outside its window.
    VoteNotOpen,
    /// The user already has a block for this poll.
    AlreadyVoted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VoteNotOpen => f.write_str("vote not open"),
            Self::AlreadyVoted => f.write_str("already voted"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(Rejection),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("append conflict persisted after {attempts} attempt(s)")]
    Conflict { attempts: u32 },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("ledger corrupted at block {index}: {reason}")]
    Corruption { index: u64, reason: String },

    #[error("insight unavailable: {0}")]
    InsightUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }

    /// Returns `true` if the caller's request was at fault (4xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidState(_)
                | Self::InvalidInput(_)
                | Self::InsightUnavailable(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PollNotFound(id) => Self::not_found("poll", id),
            StoreError::InvalidRecord(reason) => Self::InvalidInput(reason),
            e @ (StoreError::Unavailable(_) | StoreError::Io(_)) => {
                Self::Unavailable(e.to_string())
            }
            StoreError::Serialization(reason) => Self::Internal(reason),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { attempts } => Self::Conflict { attempts },
            LedgerError::Corruption { index, cause } => Self::Corruption {
                index,
                reason: cause.to_string(),
            },
            LedgerError::Unavailable(reason) => Self::Unavailable(reason),
            LedgerError::Store(e) => e.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
