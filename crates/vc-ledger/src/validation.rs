use vc_crypto::{ChainError, ChainVerifier};
use vc_types::{Block, BlockHash};

/// Result of a full-chain verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainReport {
    pub valid: bool,
    /// Blocks inspected before verification finished or stopped.
    pub blocks_scanned: u64,
    /// Position of the first block that failed verification.
    pub first_broken: Option<u64>,
    pub violation: Option<ChainError>,
    /// Hash of the last block of a valid chain.
    pub head: Option<BlockHash>,
}

impl ChainReport {
    /// Verify `blocks` in the order given.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        match ChainVerifier::verify_chain(blocks) {
            Ok(scanned) => Self {
                valid: true,
                blocks_scanned: scanned,
                first_broken: None,
                violation: None,
                head: blocks.last().map(|b| b.hash),
            },
            Err(violation) => Self {
                valid: false,
                blocks_scanned: violation.index() + 1,
                first_broken: Some(violation.index()),
                violation: Some(violation),
                head: None,
            },
        }
    }
}
