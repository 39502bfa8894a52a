//! # vledger-crypto: Chain Emulator Hashing Primitives
//!
//! - **Merkle root** (`merkle.rs`): pairwise SHA-256 folding of transaction
//!   hashes, last element duplicated on odd levels, sentinel `"0"` for an
//!   empty block.
//! - **Proof-of-work** (`pow.rs`): nonce search for a hash with a required
//!   number of leading zero hex digits, bounded by an attempt budget and an
//!   optional wall-clock deadline.
//!
//! ## Crate Policy
//!
//! - Depends only on `vledger-core` internally.
//! - All tests use real SHA-256; nothing is mocked.

pub mod error;
pub mod merkle;
pub mod pow;

pub use error::CryptoError;
pub use merkle::{merkle_root, EMPTY_MERKLE_ROOT};
pub use pow::{meets_difficulty, PowSolution, ProofOfWork, MAX_DIFFICULTY};
