//! # Error Types
//!
//! Errors shared by every crate in the workspace. Domain crates wrap these
//! in their own `thiserror` enums rather than re-exporting them.

use thiserror::Error;

/// Errors raised while constructing core primitives.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier failed validation.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Identifier kind (`vin`, `email`, `plate`, ...).
        kind: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The caller's organization identity is not one of the known members.
    #[error("unknown organization: {0:?}")]
    UnknownOrganization(String),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
