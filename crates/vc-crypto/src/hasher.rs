use vc_types::{Block, BlockHash, OptionId, PollId, Timestamp, UserId};

/// Length of the pinned pre-hash encoding of one block.
///
/// sequence (8) + previous hash (32) + user (8) + poll (8) + option (8) +
/// timestamp in microseconds (8).
pub const ENCODED_BLOCK_LEN: usize = 8 + 32 + 8 + 8 + 8 + 8;

/// Domain-separated BLAKE3 block hasher.
///
/// The domain tag is prepended to every hash computation so a block digest can
/// never collide with a digest of the same bytes produced for another purpose.
/// The encoding is fixed-width big-endian and does not go through serde, so
/// it cannot drift with serializer settings.
pub struct BlockHasher {
    domain: &'static str,
}

impl BlockHasher {
    /// Hasher for vote ledger blocks.
    pub const BLOCK: Self = Self {
        domain: "votechain-block-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Encode the hashed fields of a block in their pinned order.
    pub fn encode(
        sequence: u64,
        previous_hash: &BlockHash,
        user_id: UserId,
        poll_id: PollId,
        option_id: OptionId,
        timestamp: Timestamp,
    ) -> [u8; ENCODED_BLOCK_LEN] {
        let mut out = [0u8; ENCODED_BLOCK_LEN];
        out[0..8].copy_from_slice(&sequence.to_be_bytes());
        out[8..40].copy_from_slice(previous_hash.as_bytes());
        out[40..48].copy_from_slice(&user_id.get().to_be_bytes());
        out[48..56].copy_from_slice(&poll_id.get().to_be_bytes());
        out[56..64].copy_from_slice(&option_id.get().to_be_bytes());
        out[64..72].copy_from_slice(&timestamp.timestamp_micros().to_be_bytes());
        out
    }

    /// Hash already-encoded block content.
    pub fn hash_encoded(&self, encoded: &[u8]) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(encoded);
        BlockHash::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Compute the digest of a block's content. The stored `hash` field is
    /// ignored.
    pub fn digest(&self, block: &Block) -> BlockHash {
        let encoded = Self::encode(
            block.sequence,
            &block.previous_hash,
            block.user_id,
            block.poll_id,
            block.option_id,
            block.timestamp,
        );
        self.hash_encoded(&encoded)
    }

    /// Returns `true` if the block's stored hash matches its content.
    pub fn verify(&self, block: &Block) -> bool {
        self.digest(block) == block.hash
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
