use vc_types::{Block, BlockHash};

use crate::hasher::BlockHasher;

/// `previous_hash` of the block at sequence 0.
pub const GENESIS_HASH: BlockHash = BlockHash::zero();

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of blocks, in the order given, forms a valid
/// chain: each block's sequence equals its position, each block's
/// `previous_hash` matches the preceding block's `hash` (or the genesis
/// constant), and each stored hash is correct for the block's content.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a chain of blocks, stopping at the first violation.
    ///
    /// Returns the number of blocks checked. An empty chain is valid.
    pub fn verify_chain(blocks: &[Block]) -> Result<u64, ChainError> {
        let mut expected_prev = GENESIS_HASH;

        for (index, block) in blocks.iter().enumerate() {
            let index = index as u64;
            if block.sequence != index {
                return Err(ChainError::SequenceGap {
                    index,
                    found: block.sequence,
                });
            }

            if block.previous_hash != expected_prev {
                return Err(ChainError::BrokenLink { index });
            }

            if !BlockHasher::BLOCK.verify(block) {
                return Err(ChainError::HashMismatch { index });
            }

            expected_prev = block.hash;
        }

        Ok(blocks.len() as u64)
    }

    /// Sequence number and previous hash for the block that follows `last`.
    ///
    /// Fails when `last` already carries the largest representable sequence,
    /// which only a tampered log can reach.
    pub fn next_link(last: Option<&Block>) -> Result<(u64, BlockHash), ChainError> {
        match last {
            None => Ok((0, GENESIS_HASH)),
            Some(block) => block
                .sequence
                .checked_add(1)
                .map(|next| (next, block.hash))
                .ok_or(ChainError::SequenceOverflow {
                    index: block.sequence,
                }),
        }
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    #[error("sequence gap at index {index}: found sequence {found}")]
    SequenceGap { index: u64, found: u64 },

    #[error("broken link at index {index}: previous_hash does not match")]
    BrokenLink { index: u64 },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: u64 },

    /// The tail block claims a sequence with no successor.
    #[error("sequence overflow after block {index}")]
    SequenceOverflow { index: u64 },
}

impl ChainError {
    /// Position of the first offending block.
    pub fn index(&self) -> u64 {
        match self {
            Self::SequenceGap { index, .. }
            | Self::BrokenLink { index }
            | Self::HashMismatch { index }
            | Self::SequenceOverflow { index } => *index,
        }
    }
}
