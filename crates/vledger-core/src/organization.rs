//! # Organizations
//!
//! The closed set of network members. A caller's credential carries an MSP
//! identifier string; it is parsed into [`Organization`] exactly once, at the
//! gateway boundary. An unknown MSP id is rejected there and never reaches
//! the authorization table.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A member organization of the vehicle ledger network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Organization {
    /// Transport registration authority. The designated registrant: creates,
    /// transfers and deletes records and may stand in for any verifier.
    Registrar,
    /// Insurance provider; approves the `insurance` verification.
    Insurer,
    /// Emission testing centre; approves the `emission` verification.
    EmissionTester,
    /// Traffic police / law enforcement; reports violations, thefts and
    /// recoveries.
    Enforcement,
    /// Vehicle manufacturer; may mint placeholder records before sale.
    Manufacturer,
}

impl Organization {
    /// Every member, in declaration order.
    pub const ALL: [Organization; 5] = [
        Self::Registrar,
        Self::Insurer,
        Self::EmissionTester,
        Self::Enforcement,
        Self::Manufacturer,
    ];

    /// The MSP identifier carried by this organization's credentials.
    pub fn msp_id(&self) -> &'static str {
        match self {
            Self::Registrar => "RegistrarMSP",
            Self::Insurer => "InsurerMSP",
            Self::EmissionTester => "EmissionMSP",
            Self::Enforcement => "EnforcementMSP",
            Self::Manufacturer => "ManufacturerMSP",
        }
    }

    /// Parse an MSP identifier.
    ///
    /// Accepts the exact MSP id or the short organization name
    /// (`registrar`, `insurer`, `emission`, `enforcement`, `manufacturer`),
    /// case-insensitively.
    pub fn from_msp_id(raw: &str) -> Result<Self, CoreError> {
        let needle = raw.trim();
        for org in Self::ALL {
            if org.msp_id().eq_ignore_ascii_case(needle)
                || org.short_name().eq_ignore_ascii_case(needle)
            {
                return Ok(org);
            }
        }
        Err(CoreError::UnknownOrganization(raw.to_string()))
    }

    /// Short lowercase name, used in CLI flags and log fields.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Registrar => "registrar",
            Self::Insurer => "insurer",
            Self::EmissionTester => "emission",
            Self::Enforcement => "enforcement",
            Self::Manufacturer => "manufacturer",
        }
    }
}

impl std::fmt::Display for Organization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.msp_id())
    }
}

impl std::str::FromStr for Organization {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_msp_id(s)
    }
}
