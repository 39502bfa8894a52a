//! # vledger-state: Vehicle Record State Machine
//!
//! The data model of a vehicle record and every transition it may undergo.
//! Transitions are methods on [`VehicleRecord`] that validate the current
//! state, mutate the record, and append exactly the history entries the
//! transition implies. They perform no I/O and no authorization; the
//! contract crate wraps them with the guard, persistence, and events.
//!
//! ## States
//!
//! ```text
//! MINTED ──attach owner──▶ REGISTERED ──all three verifications APPROVED──▶ APPROVED
//!                              ▲                                              │
//!                              └──────── any verification not APPROVED ◀──────┘
//!
//! any non-deleted state ──report stolen──▶ STOLEN ──recover──▶ previous status
//! ```
//!
//! `DELETED` is never stored on a record; it appears only in the deletion
//! event emitted when a record is physically removed.
//!
//! ## Design
//!
//! Unlike a typestate machine, the status here is a runtime enum: records are
//! loaded from storage and their state is only known after deserialization.
//! Each transition returns `Result` and leaves the record untouched on error.

pub mod error;
pub mod history;
pub mod record;
pub mod reports;
pub mod verification;

pub use error::TransitionError;
pub use history::{HistoryAction, HistoryEntry, TransitionContext};
pub use record::{Owner, VehicleDetails, VehicleRecord, VehicleStatus, VehicleUpdate};
pub use reports::{
    RecoveryInput, RecoveryReport, StolenReport, TheftInput, ViolationInput, ViolationRecord,
};
pub use verification::{
    VerificationOutcome, VerificationState, VerificationStatus, VerifierKind,
};
