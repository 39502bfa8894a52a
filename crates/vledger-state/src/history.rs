//! # History Log
//!
//! Every transition appends one or more [`HistoryEntry`] values to the
//! record. Entries are never edited, removed or reordered, and their
//! timestamps never decrease within a record.

use serde::{Deserialize, Serialize};
use vledger_core::{Organization, Timestamp, TxId};

/// Who is performing a transition, when, and under which transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionContext {
    /// Transaction id assigned by the ordering backend.
    pub tx_id: TxId,
    /// Transaction timestamp.
    pub timestamp: Timestamp,
    /// Calling organization.
    pub organization: Organization,
}

impl TransitionContext {
    /// Build a context.
    pub fn new(tx_id: TxId, timestamp: Timestamp, organization: Organization) -> Self {
        Self {
            tx_id,
            timestamp,
            organization,
        }
    }
}

/// Action tag of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    /// Placeholder record created before an owner is known.
    Minted,
    /// Owner attached; record entered `REGISTERED`.
    Registered,
    /// One verification gate changed.
    VerificationUpdated,
    /// Synthetic entry: all gates approved, record entered `APPROVED`.
    Approved,
    /// Synthetic entry: a gate left `APPROVED`, record returned to `REGISTERED`.
    VerificationReopened,
    /// Owner replaced.
    OwnershipTransferred,
    /// Cosmetic fields updated.
    VehicleUpdated,
    /// Plate number changed.
    PlateChanged,
    /// Traffic violation recorded.
    ViolationReported,
    /// Theft reported; record entered `STOLEN`.
    ReportedStolen,
    /// Theft resolved; record restored to its previous status.
    Recovered,
}

impl HistoryAction {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minted => "MINTED",
            Self::Registered => "REGISTERED",
            Self::VerificationUpdated => "VERIFICATION_UPDATED",
            Self::Approved => "APPROVED",
            Self::VerificationReopened => "VERIFICATION_REOPENED",
            Self::OwnershipTransferred => "OWNERSHIP_TRANSFERRED",
            Self::VehicleUpdated => "VEHICLE_UPDATED",
            Self::PlateChanged => "PLATE_CHANGED",
            Self::ViolationReported => "VIOLATION_REPORTED",
            Self::ReportedStolen => "REPORTED_STOLEN",
            Self::Recovered => "RECOVERED",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in a record's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// What happened.
    pub action: HistoryAction,
    /// When it happened.
    pub timestamp: Timestamp,
    /// Organization that performed it.
    pub performed_by: Organization,
    /// Human-readable detail.
    pub details: String,
    /// Originating transaction.
    pub tx_id: TxId,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}
