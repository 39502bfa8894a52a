//! # Enforcement Reports
//!
//! Violations accumulate; theft and recovery reports are single-valued and
//! replaced by the next report of the same kind.

use serde::{Deserialize, Serialize};
use vledger_core::{Organization, Timestamp, TxId};

use crate::record::VehicleStatus;

/// A recorded traffic violation. Append-only on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    /// Stable id: `<tx_id>-<index>`.
    pub id: String,
    /// Violation category (e.g. `SPEEDING`).
    pub violation_type: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Where it occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Fine in minor currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine_amount: Option<u64>,
    /// Reporting organization.
    pub reported_by: Organization,
    /// Report time.
    pub reported_at: Timestamp,
    /// Originating transaction.
    pub tx_id: TxId,
}

/// The current theft report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StolenReport {
    /// Where the vehicle was last seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Police report / FIR reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_reference: Option<String>,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Status the record had when it was reported, restored on recovery.
    pub previous_status: VehicleStatus,
    /// Reporting organization.
    pub reported_by: Organization,
    /// Report time.
    pub reported_at: Timestamp,
    /// Originating transaction.
    pub tx_id: TxId,
}

/// The most recent recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    /// Where it was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Status the record was restored to.
    pub restored_status: VehicleStatus,
    /// Recovering organization.
    pub recovered_by: Organization,
    /// Recovery time.
    pub recovered_at: Timestamp,
    /// Originating transaction.
    pub tx_id: TxId,
}

/// Caller-supplied violation fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationInput {
    /// Violation category; required.
    #[serde(default, alias = "type")]
    pub violation_type: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Where it occurred.
    #[serde(default)]
    pub location: Option<String>,
    /// Fine in minor currency units.
    #[serde(default, alias = "fine")]
    pub fine_amount: Option<u64>,
}

/// Caller-supplied theft report fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheftInput {
    /// Where the vehicle was last seen.
    #[serde(default)]
    pub location: Option<String>,
    /// Police report / FIR reference.
    #[serde(default, alias = "firNumber")]
    pub report_reference: Option<String>,
    /// Free text.
    #[serde(default)]
    pub description: String,
}

/// Caller-supplied recovery fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInput {
    /// Where it was found.
    #[serde(default)]
    pub location: Option<String>,
    /// Free text.
    #[serde(default)]
    pub description: String,
}
