//! # Chain Errors

use std::path::PathBuf;

use thiserror::Error;
use vledger_core::CanonicalizationError;
use vledger_crypto::CryptoError;

/// Errors from the local chain emulator.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Hashing or proof-of-work failed (including search exhaustion).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A transaction payload could not be canonicalized for hashing.
    #[error("transaction payload: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Block list serialization failed.
    #[error("chain serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted chain file is unreadable or inconsistent.
    #[error("corrupt chain file {path}: {reason}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// A staged tip was applied after the chain moved on.
    #[error("staged block is stale: staged on tip {staged_on}, tip is now {tip}")]
    StaleAppend {
        /// Tip hash the append was staged against.
        staged_on: String,
        /// Current tip hash.
        tip: String,
    },

    /// Invalid emulator configuration.
    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}

impl ChainError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
