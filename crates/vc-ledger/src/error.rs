use vc_crypto::ChainError;
use vc_store::StoreError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Every append attempt lost the sequence race to another writer.
    #[error("append conflict persisted after {attempts} attempt(s)")]
    Conflict { attempts: u32 },

    /// The chain failed verification. Never repaired automatically.
    #[error("ledger corrupted at block {index}: {cause}")]
    Corruption { index: u64, cause: ChainError },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns `true` if the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } | Self::Unavailable(_) => true,
            Self::Store(e) => e.is_retryable(),
            Self::Corruption { .. } => false,
        }
    }
}
