//! Cryptographic primitives for Votechain.
//!
//! Provides the pinned pre-hash encoding of ledger blocks, domain-separated
//! BLAKE3 block hashing, and hash chain verification.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, ChainVerifier, GENESIS_HASH};
pub use hasher::{BlockHasher, ENCODED_BLOCK_LEN};
