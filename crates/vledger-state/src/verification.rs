//! # Verification Gates
//!
//! A vehicle carries exactly three independent approval gates. The struct
//! has one field per gate rather than a map so that a missing or extra kind
//! is unrepresentable.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// One of the three verification gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierKind {
    /// Insurance coverage check.
    Insurance,
    /// Emission / pollution-under-control check.
    Emission,
    /// Registrar's administrative check.
    Admin,
}

impl VerifierKind {
    /// All kinds, in the order they are conventionally verified.
    pub const ALL: [VerifierKind; 3] = [Self::Insurance, Self::Emission, Self::Admin];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insurance => "insurance",
            Self::Emission => "emission",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for VerifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerifierKind {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insurance" => Ok(Self::Insurance),
            "emission" => Ok(Self::Emission),
            "admin" => Ok(Self::Admin),
            other => Err(TransitionError::InvalidArgument(format!(
                "unknown verifier kind {other:?}; expected insurance, emission or admin"
            ))),
        }
    }
}

/// The value of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    /// Not yet decided.
    Pending,
    /// Gate passed.
    Approved,
    /// Gate failed.
    Rejected,
}

impl VerificationState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationState {
    type Err = TransitionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(TransitionError::InvalidArgument(format!(
                "unknown verification status {other:?}; expected PENDING, APPROVED or REJECTED"
            ))),
        }
    }
}

/// All three gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    /// Insurance gate.
    pub insurance: VerificationState,
    /// Emission gate.
    pub emission: VerificationState,
    /// Administrative gate.
    pub admin: VerificationState,
}

impl VerificationStatus {
    /// Every gate `PENDING`.
    pub fn pending() -> Self {
        Self {
            insurance: VerificationState::Pending,
            emission: VerificationState::Pending,
            admin: VerificationState::Pending,
        }
    }

    /// Read a gate.
    pub fn get(&self, kind: VerifierKind) -> VerificationState {
        match kind {
            VerifierKind::Insurance => self.insurance,
            VerifierKind::Emission => self.emission,
            VerifierKind::Admin => self.admin,
        }
    }

    /// Write a gate, returning the previous value.
    pub fn set(&mut self, kind: VerifierKind, state: VerificationState) -> VerificationState {
        let slot = match kind {
            VerifierKind::Insurance => &mut self.insurance,
            VerifierKind::Emission => &mut self.emission,
            VerifierKind::Admin => &mut self.admin,
        };
        std::mem::replace(slot, state)
    }

    /// Whether every gate reads `APPROVED`.
    pub fn all_approved(&self) -> bool {
        VerifierKind::ALL
            .iter()
            .all(|k| self.get(*k) == VerificationState::Approved)
    }

    /// Whether any gate reads `state`.
    pub fn any(&self, state: VerificationState) -> bool {
        VerifierKind::ALL.iter().any(|k| self.get(*k) == state)
    }
}

impl Default for VerificationStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// What a verification update did to the record's overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Gate value before the update.
    pub previous: VerificationState,
    /// The update completed the set and moved the record to `APPROVED`.
    pub became_approved: bool,
    /// The update broke a complete set and moved the record back to
    /// `REGISTERED`.
    pub reopened: bool,
}
