//! # Transition Errors

use thiserror::Error;

use crate::record::VehicleStatus;

/// Reasons a transition is rejected. The record is unchanged in every case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition is not permitted from the record's current status.
    #[error("vehicle {vin} is {status}; cannot {operation}")]
    InvalidState {
        /// VIN of the record.
        vin: String,
        /// Current status.
        status: VehicleStatus,
        /// Attempted operation.
        operation: &'static str,
    },

    /// The caller's view of the current owner is stale.
    #[error("current owner mismatch: record owner is {actual}, caller asserted {asserted}")]
    OwnerMismatch {
        /// Owner e-mail on the record.
        actual: String,
        /// Owner e-mail the caller believed current.
        asserted: String,
    },

    /// An input value is malformed or not permitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A history payload could not be encoded as JSON.
    #[error("cannot encode {what}: {reason}")]
    Encoding {
        /// What was being encoded.
        what: &'static str,
        /// Encoder message.
        reason: String,
    },
}
