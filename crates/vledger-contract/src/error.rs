//! # Ledger Errors
//!
//! Every failure surfaced to a caller is a [`LedgerError`] with a stable
//! machine code. Nothing is retried internally.

use thiserror::Error;
use vledger_chain::ChainError;
use vledger_core::{CoreError, Organization};
use vledger_state::TransitionError;
use vledger_store::StoreError;

use crate::auth::OperationCategory;

/// A typed ledger failure.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Unknown VIN, plate, owner, block or transaction.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate VIN on register/mint, or a plate already assigned.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Caller's organization is outside the category's authorized set.
    #[error("organization {organization} is not authorized for {category}")]
    Unauthorized {
        organization: Organization,
        category: OperationCategory,
    },

    /// Missing required field, unknown verifier kind or status, bad format.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stale transfer precondition.
    #[error("owner mismatch: record owner is {actual}, caller asserted {asserted}")]
    OwnerMismatch { actual: String, asserted: String },

    /// Operation not permitted in the record's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Persistence failed; nothing was committed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Block assembly failed; nothing was committed.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// A transaction or history payload could not be encoded; nothing was
    /// committed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Stable machine code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::OwnerMismatch { .. } => "OWNER_MISMATCH",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Chain(_) => "CHAIN_ERROR",
            Self::Encoding(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<TransitionError> for LedgerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            TransitionError::OwnerMismatch { actual, asserted } => {
                Self::OwnerMismatch { actual, asserted }
            }
            TransitionError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            TransitionError::Encoding { .. } => Self::Encoding(err.to_string()),
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
