//! # Authorization Guard
//!
//! A static table from operation category to the organizations allowed to
//! invoke it. The decision is a pure function of `(category, organization)`
//! and is evaluated by exhaustive match, so adding an organization or a
//! category is a compile error until the table is extended.
//!
//! | Category | Authorized |
//! |----------|------------|
//! | `mint` | Manufacturer, Registrar |
//! | `register` | Registrar |
//! | `verify-insurance` | Insurer, Registrar |
//! | `verify-emission` | EmissionTester, Registrar |
//! | `verify-admin` | Registrar |
//! | `transfer` | Registrar |
//! | `update` | Registrar |
//! | `report-violation` | Enforcement, Registrar |
//! | `report-stolen` | Enforcement, Registrar |
//! | `mark-recovered` | Enforcement, Registrar |
//! | `delete` | Registrar |
//!
//! Every mutating operation calls [`require`] before loading any state.

use serde::{Deserialize, Serialize};
use vledger_core::Organization;
use vledger_state::VerifierKind;

use crate::error::LedgerError;

/// Operation categories subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationCategory {
    Mint,
    Register,
    VerifyInsurance,
    VerifyEmission,
    VerifyAdmin,
    Transfer,
    Update,
    ReportViolation,
    ReportStolen,
    MarkRecovered,
    Delete,
}

impl OperationCategory {
    /// Every category.
    pub const ALL: [OperationCategory; 11] = [
        Self::Mint,
        Self::Register,
        Self::VerifyInsurance,
        Self::VerifyEmission,
        Self::VerifyAdmin,
        Self::Transfer,
        Self::Update,
        Self::ReportViolation,
        Self::ReportStolen,
        Self::MarkRecovered,
        Self::Delete,
    ];

    /// The category guarding a verification gate.
    pub fn for_verifier(kind: VerifierKind) -> Self {
        match kind {
            VerifierKind::Insurance => Self::VerifyInsurance,
            VerifierKind::Emission => Self::VerifyEmission,
            VerifierKind::Admin => Self::VerifyAdmin,
        }
    }

    /// Category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Register => "register",
            Self::VerifyInsurance => "verify-insurance",
            Self::VerifyEmission => "verify-emission",
            Self::VerifyAdmin => "verify-admin",
            Self::Transfer => "transfer",
            Self::Update => "update",
            Self::ReportViolation => "report-violation",
            Self::ReportStolen => "report-stolen",
            Self::MarkRecovered => "mark-recovered",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `org` may perform operations of `category`.
pub fn is_authorized(category: OperationCategory, org: Organization) -> bool {
    use OperationCategory as C;
    use Organization as O;
    match (category, org) {
        (C::Mint, O::Registrar | O::Manufacturer) => true,
        (C::Mint, O::Insurer | O::EmissionTester | O::Enforcement) => false,

        (C::VerifyInsurance, O::Registrar | O::Insurer) => true,
        (C::VerifyInsurance, O::EmissionTester | O::Enforcement | O::Manufacturer) => false,

        (C::VerifyEmission, O::Registrar | O::EmissionTester) => true,
        (C::VerifyEmission, O::Insurer | O::Enforcement | O::Manufacturer) => false,

        (
            C::ReportViolation | C::ReportStolen | C::MarkRecovered,
            O::Registrar | O::Enforcement,
        ) => true,
        (
            C::ReportViolation | C::ReportStolen | C::MarkRecovered,
            O::Insurer | O::EmissionTester | O::Manufacturer,
        ) => false,

        (C::Register | C::VerifyAdmin | C::Transfer | C::Update | C::Delete, O::Registrar) => true,
        (
            C::Register | C::VerifyAdmin | C::Transfer | C::Update | C::Delete,
            O::Insurer | O::EmissionTester | O::Enforcement | O::Manufacturer,
        ) => false,
    }
}

/// Organizations authorized for `category`, in declaration order.
pub fn authorized_organizations(category: OperationCategory) -> Vec<Organization> {
    Organization::ALL
        .into_iter()
        .filter(|org| is_authorized(category, *org))
        .collect()
}

/// Fail with [`LedgerError::Unauthorized`] unless `org` may perform
/// `category`.
pub fn require(category: OperationCategory, org: Organization) -> Result<(), LedgerError> {
    if is_authorized(category, org) {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized {
            organization: org,
            category,
        })
    }
}
