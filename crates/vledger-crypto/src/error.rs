//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from hashing and proof-of-work operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The nonce search ran out of budget before finding a valid hash.
    #[error("proof-of-work exhausted after {attempts} attempts at difficulty {difficulty}")]
    ProofOfWorkExhausted {
        /// Nonces tried.
        attempts: u64,
        /// Leading zero hex digits required.
        difficulty: u32,
    },

    /// The configured difficulty is outside the supported range.
    #[error("difficulty {0} exceeds the maximum of {max}", max = crate::pow::MAX_DIFFICULTY)]
    DifficultyOutOfRange(u32),

    /// A hash that should be 64 lowercase hex characters was not.
    #[error("malformed hash {0:?}: expected 64 hex chars")]
    MalformedHash(String),
}
