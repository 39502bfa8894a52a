//! # Vehicle Record
//!
//! The primary entity, keyed by VIN, and its transitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vledger_core::{Organization, OwnerEmail, PlateNumber, Timestamp, Vin};

use crate::error::TransitionError;
use crate::history::{HistoryAction, HistoryEntry, TransitionContext};
use crate::reports::{
    RecoveryInput, RecoveryReport, StolenReport, TheftInput, ViolationInput, ViolationRecord,
};
use crate::verification::{VerificationOutcome, VerificationState, VerificationStatus, VerifierKind};

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of a vehicle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    /// Placeholder record with no owner.
    Minted,
    /// Owner attached, verification in progress.
    Registered,
    /// All three verification gates approved.
    Approved,
    /// Reported stolen; the prior status is remembered.
    Stolen,
    /// Physically removed. Only ever seen in the deletion event.
    Deleted,
}

impl VehicleStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minted => "MINTED",
            Self::Registered => "REGISTERED",
            Self::Approved => "APPROVED",
            Self::Stolen => "STOLEN",
            Self::Deleted => "DELETED",
        }
    }

    /// Every status a stored record can have.
    pub const STORED: [VehicleStatus; 4] = [
        Self::Minted,
        Self::Registered,
        Self::Approved,
        Self::Stolen,
    ];
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VehicleStatus {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MINTED" => Ok(Self::Minted),
            "REGISTERED" => Ok(Self::Registered),
            "APPROVED" => Ok(Self::Approved),
            "STOLEN" => Ok(Self::Stolen),
            "DELETED" => Ok(Self::Deleted),
            other => Err(TransitionError::InvalidArgument(format!(
                "unknown vehicle status {other:?}"
            ))),
        }
    }
}

// ─── Owner & Details ─────────────────────────────────────────────────

/// Registered owner. A value, duplicated into the record and the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Natural key.
    pub email: OwnerEmail,
    /// Display name.
    pub name: String,
    /// External user id, if the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Descriptive vehicle attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    pub make: String,
    pub model: String,
    pub year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacement: Option<String>,
}

/// The only fields `UpdateVehicle` may touch.
///
/// Unknown fields are rejected at deserialization, which keeps `vin`,
/// `owner` and `status` out of reach of this path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VehicleUpdate {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub engine_number: Option<String>,
    #[serde(default)]
    pub chassis_number: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default)]
    pub displacement: Option<String>,
}

impl VehicleUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.engine_number.is_none()
            && self.chassis_number.is_none()
            && self.vehicle_type.is_none()
            && self.fuel_type.is_none()
            && self.transmission.is_none()
            && self.displacement.is_none()
    }
}

// ─── Record ──────────────────────────────────────────────────────────

/// A vehicle record and its full audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub vin: Vin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<PlateNumber>,
    #[serde(flatten)]
    pub details: VehicleDetails,
    #[serde(default)]
    pub owner: Option<Owner>,
    pub status: VehicleStatus,
    /// Status to restore on recovery; set only while `STOLEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<VehicleStatus>,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub notes: BTreeMap<VerifierKind, String>,
    #[serde(default)]
    pub violations: Vec<ViolationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stolen_report: Option<StolenReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_report: Option<RecoveryReport>,
    pub history: Vec<HistoryEntry>,
    pub created_by: Organization,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
}

impl VehicleRecord {
    /// Create a placeholder record with no owner, in `MINTED`.
    pub fn mint(
        vin: Vin,
        plate_number: Option<PlateNumber>,
        details: VehicleDetails,
        ctx: &TransitionContext,
    ) -> Self {
        let mut record = Self::blank(vin, plate_number, details, None, VehicleStatus::Minted, ctx);
        let details = format!(
            "Vehicle {} {} ({}) minted by {}",
            record.details.make, record.details.model, record.details.year, ctx.organization
        );
        record.push_history(HistoryAction::Minted, details, None, ctx);
        record
    }

    /// Create a registered record with an owner, in `REGISTERED`.
    pub fn register(
        vin: Vin,
        plate_number: Option<PlateNumber>,
        details: VehicleDetails,
        owner: Owner,
        ctx: &TransitionContext,
    ) -> Self {
        let detail = format!("Vehicle registered to {}", owner.email);
        let payload = json!({ "owner": owner });
        let mut record = Self::blank(
            vin,
            plate_number,
            details,
            Some(owner),
            VehicleStatus::Registered,
            ctx,
        );
        record.push_history(HistoryAction::Registered, detail, Some(payload), ctx);
        record
    }

    fn blank(
        vin: Vin,
        plate_number: Option<PlateNumber>,
        details: VehicleDetails,
        owner: Option<Owner>,
        status: VehicleStatus,
        ctx: &TransitionContext,
    ) -> Self {
        Self {
            vin,
            plate_number,
            details,
            owner,
            status,
            previous_status: None,
            verification_status: VerificationStatus::pending(),
            notes: BTreeMap::new(),
            violations: Vec::new(),
            stolen_report: None,
            recovery_report: None,
            history: Vec::new(),
            created_by: ctx.organization,
            created_at: ctx.timestamp,
            last_updated: ctx.timestamp,
        }
    }

    /// Attach an owner to a minted record (MINTED → REGISTERED).
    ///
    /// A plate supplied at registration replaces any minted plate; details
    /// supplied at registration replace the minted details.
    pub fn attach_owner(
        &mut self,
        owner: Owner,
        plate_number: Option<PlateNumber>,
        details: Option<VehicleDetails>,
        ctx: &TransitionContext,
    ) -> Result<(), TransitionError> {
        self.require(&[VehicleStatus::Minted], "register a minted vehicle")?;
        if plate_number.is_some() {
            self.plate_number = plate_number;
        }
        if let Some(details) = details {
            self.details = details;
        }
        let detail = format!("Vehicle registered to {}", owner.email);
        let payload = json!({ "owner": owner });
        self.owner = Some(owner);
        self.status = VehicleStatus::Registered;
        self.push_history(HistoryAction::Registered, detail, Some(payload), ctx);
        Ok(())
    }

    /// Set one verification gate.
    ///
    /// Completing the set moves the record to `APPROVED` and appends a
    /// synthetic `APPROVED` entry; breaking a complete set moves it back to
    /// `REGISTERED` with a `VERIFICATION_REOPENED` entry. Re-approving an
    /// already approved gate records the update but changes no status.
    pub fn update_verification(
        &mut self,
        kind: VerifierKind,
        state: VerificationState,
        notes: Option<String>,
        ctx: &TransitionContext,
    ) -> Result<VerificationOutcome, TransitionError> {
        self.require(
            &[VehicleStatus::Registered, VehicleStatus::Approved],
            "update verification",
        )?;

        let previous = self.verification_status.set(kind, state);
        self.notes.insert(kind, notes.clone().unwrap_or_default());
        self.push_history(
            HistoryAction::VerificationUpdated,
            format!("{kind} verification {previous} -> {state}"),
            Some(json!({
                "verifier": kind,
                "previous": previous,
                "status": state,
                "notes": notes,
            })),
            ctx,
        );

        let mut outcome = VerificationOutcome {
            previous,
            became_approved: false,
            reopened: false,
        };
        let all_approved = self.verification_status.all_approved();
        if all_approved && self.status == VehicleStatus::Registered {
            self.status = VehicleStatus::Approved;
            outcome.became_approved = true;
            self.push_history(
                HistoryAction::Approved,
                "All verifications approved".to_string(),
                None,
                ctx,
            );
        } else if !all_approved && self.status == VehicleStatus::Approved {
            self.status = VehicleStatus::Registered;
            outcome.reopened = true;
            self.push_history(
                HistoryAction::VerificationReopened,
                format!("{kind} verification is now {state}; approval withdrawn"),
                None,
                ctx,
            );
        }
        Ok(outcome)
    }

    /// Replace the owner, checking the caller's view of the current owner.
    ///
    /// Returns the previous owner.
    pub fn transfer_ownership(
        &mut self,
        asserted_current: &OwnerEmail,
        new_owner: Owner,
        reason: Option<String>,
        ctx: &TransitionContext,
    ) -> Result<Owner, TransitionError> {
        self.require(
            &[VehicleStatus::Registered, VehicleStatus::Approved],
            "transfer ownership",
        )?;
        let current = self.owner.clone().ok_or_else(|| TransitionError::InvalidState {
            vin: self.vin.to_string(),
            status: self.status,
            operation: "transfer ownership",
        })?;
        if &current.email != asserted_current {
            return Err(TransitionError::OwnerMismatch {
                actual: current.email.to_string(),
                asserted: asserted_current.to_string(),
            });
        }
        if current.email == new_owner.email {
            return Err(TransitionError::InvalidArgument(format!(
                "{} already owns {}",
                new_owner.email, self.vin
            )));
        }

        let detail = format!(
            "Ownership transferred from {} to {}",
            current.email, new_owner.email
        );
        let payload = json!({
            "previousOwner": current,
            "newOwner": new_owner,
            "reason": reason,
        });
        self.owner = Some(new_owner);
        self.push_history(HistoryAction::OwnershipTransferred, detail, Some(payload), ctx);
        Ok(current)
    }

    /// Apply an allow-listed cosmetic update. Returns the changed field names.
    ///
    /// An update that names no field, or only restates current values, is
    /// rejected and records nothing.
    pub fn apply_update(
        &mut self,
        update: &VehicleUpdate,
        ctx: &TransitionContext,
    ) -> Result<Vec<&'static str>, TransitionError> {
        if update.is_empty() {
            return Err(TransitionError::InvalidArgument(
                "update names no updatable field".into(),
            ));
        }
        let payload = encode(update, "vehicle update")?;
        let d = &mut self.details;
        let slots: [(&'static str, &Option<String>, &mut Option<String>); 7] = [
            ("color", &update.color, &mut d.color),
            ("engineNumber", &update.engine_number, &mut d.engine_number),
            ("chassisNumber", &update.chassis_number, &mut d.chassis_number),
            ("vehicleType", &update.vehicle_type, &mut d.vehicle_type),
            ("fuelType", &update.fuel_type, &mut d.fuel_type),
            ("transmission", &update.transmission, &mut d.transmission),
            ("displacement", &update.displacement, &mut d.displacement),
        ];
        let pending: Vec<_> = slots
            .into_iter()
            .filter_map(|(name, new, slot)| match new {
                Some(value) if slot.as_ref() != Some(value) => Some((name, value, slot)),
                _ => None,
            })
            .collect();
        if pending.is_empty() {
            return Err(TransitionError::InvalidArgument(format!(
                "update leaves {} unchanged",
                self.vin
            )));
        }
        let mut changed = Vec::with_capacity(pending.len());
        for (name, value, slot) in pending {
            *slot = Some(value.clone());
            changed.push(name);
        }
        self.push_history(
            HistoryAction::VehicleUpdated,
            format!("Updated fields: {}", changed.join(", ")),
            Some(payload),
            ctx,
        );
        Ok(changed)
    }

    /// Replace the plate number. Returns the previous plate.
    pub fn change_plate(
        &mut self,
        plate: PlateNumber,
        ctx: &TransitionContext,
    ) -> Result<Option<PlateNumber>, TransitionError> {
        if self.plate_number.as_ref() == Some(&plate) {
            return Err(TransitionError::InvalidArgument(format!(
                "{} already carries plate {plate}",
                self.vin
            )));
        }
        let previous = self.plate_number.replace(plate.clone());
        self.push_history(
            HistoryAction::PlateChanged,
            format!(
                "Plate changed from {} to {plate}",
                previous.as_ref().map(|p| p.as_str()).unwrap_or("(none)")
            ),
            Some(json!({ "previous": previous, "plateNumber": plate })),
            ctx,
        );
        Ok(previous)
    }

    /// Append a violation.
    pub fn report_violation(
        &mut self,
        input: ViolationInput,
        ctx: &TransitionContext,
    ) -> Result<ViolationRecord, TransitionError> {
        self.require(
            &[
                VehicleStatus::Registered,
                VehicleStatus::Approved,
                VehicleStatus::Stolen,
            ],
            "report a violation",
        )?;
        if self.owner.is_none() {
            return Err(TransitionError::InvalidState {
                vin: self.vin.to_string(),
                status: self.status,
                operation: "report a violation",
            });
        }
        let violation_type = input.violation_type.trim().to_string();
        if violation_type.is_empty() {
            return Err(TransitionError::InvalidArgument(
                "violation type is required".into(),
            ));
        }
        let record = ViolationRecord {
            id: format!("{}-{}", ctx.tx_id, self.violations.len()),
            violation_type,
            description: input.description,
            location: input.location,
            fine_amount: input.fine_amount,
            reported_by: ctx.organization,
            reported_at: self.next_timestamp(ctx),
            tx_id: ctx.tx_id.clone(),
        };
        let payload = encode(&record, "violation")?;
        self.violations.push(record.clone());
        self.push_history(
            HistoryAction::ViolationReported,
            format!("Violation reported: {}", record.violation_type),
            Some(payload),
            ctx,
        );
        Ok(record)
    }

    /// Move to `STOLEN`, remembering the current status.
    pub fn report_stolen(
        &mut self,
        input: TheftInput,
        ctx: &TransitionContext,
    ) -> Result<StolenReport, TransitionError> {
        self.require(
            &[
                VehicleStatus::Minted,
                VehicleStatus::Registered,
                VehicleStatus::Approved,
            ],
            "report stolen",
        )?;
        let report = StolenReport {
            location: input.location,
            report_reference: input.report_reference,
            description: input.description,
            previous_status: self.status,
            reported_by: ctx.organization,
            reported_at: self.next_timestamp(ctx),
            tx_id: ctx.tx_id.clone(),
        };
        let payload = encode(&report, "theft report")?;
        self.previous_status = Some(self.status);
        self.status = VehicleStatus::Stolen;
        self.stolen_report = Some(report.clone());
        self.push_history(
            HistoryAction::ReportedStolen,
            format!("Reported stolen (was {})", report.previous_status),
            Some(payload),
            ctx,
        );
        Ok(report)
    }

    /// Leave `STOLEN`, restoring the remembered status.
    pub fn mark_recovered(
        &mut self,
        input: RecoveryInput,
        ctx: &TransitionContext,
    ) -> Result<RecoveryReport, TransitionError> {
        self.require(&[VehicleStatus::Stolen], "mark recovered")?;
        let restored = self
            .previous_status
            .or_else(|| self.stolen_report.as_ref().map(|r| r.previous_status))
            .unwrap_or(if self.owner.is_some() {
                VehicleStatus::Registered
            } else {
                VehicleStatus::Minted
            });
        let report = RecoveryReport {
            location: input.location,
            description: input.description,
            restored_status: restored,
            recovered_by: ctx.organization,
            recovered_at: self.next_timestamp(ctx),
            tx_id: ctx.tx_id.clone(),
        };
        let payload = encode(&report, "recovery report")?;
        self.status = restored;
        self.previous_status = None;
        self.recovery_report = Some(report.clone());
        self.push_history(
            HistoryAction::Recovered,
            format!("Recovered; status restored to {restored}"),
            Some(payload),
            ctx,
        );
        Ok(report)
    }

    /// Owner e-mail, if an owner is attached.
    pub fn owner_email(&self) -> Option<&OwnerEmail> {
        self.owner.as_ref().map(|o| &o.email)
    }

    fn require(
        &self,
        allowed: &[VehicleStatus],
        operation: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                vin: self.vin.to_string(),
                status: self.status,
                operation,
            })
        }
    }

    /// The context timestamp, clamped so history never goes backwards.
    fn next_timestamp(&self, ctx: &TransitionContext) -> Timestamp {
        match self.history.last() {
            Some(last) if last.timestamp > ctx.timestamp => last.timestamp,
            _ => ctx.timestamp,
        }
    }

    fn push_history(
        &mut self,
        action: HistoryAction,
        details: String,
        payload: Option<Value>,
        ctx: &TransitionContext,
    ) {
        let timestamp = self.next_timestamp(ctx);
        self.history.push(HistoryEntry {
            action,
            timestamp,
            performed_by: ctx.organization,
            details,
            tx_id: ctx.tx_id.clone(),
            payload,
        });
        self.last_updated = timestamp;
    }
}

fn encode<T: Serialize>(value: &T, what: &'static str) -> Result<Value, TransitionError> {
    serde_json::to_value(value).map_err(|e| TransitionError::Encoding {
        what,
        reason: e.to_string(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────
