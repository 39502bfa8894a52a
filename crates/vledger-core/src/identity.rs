//! # Identifier Newtypes
//!
//! Newtype wrappers for every key the ledger indexes by. Each has a
//! validating constructor that normalizes the raw string once, at the
//! boundary, so lookups never disagree on case or whitespace.
//!
//! None of the identifiers may contain a NUL character: NUL is the
//! composite-key separator used by the index maintainer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Vehicle Identification Number, the primary key of a vehicle record.
///
/// Normalized to uppercase ASCII. Immutable once a record is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);

/// Owner e-mail, the owner's natural key in the `owners` map and index.
///
/// Normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerEmail(String);

/// Registration plate number.
///
/// Normalized to uppercase with internal whitespace removed, so
/// `"ka 01 ab 1234"` and `"KA01AB1234"` are the same plate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlateNumber(String);

/// Transaction identifier assigned by whichever backend ordered the call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

const MAX_IDENTIFIER_LEN: usize = 128;

fn check_common(kind: &'static str, s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: "must not be empty".into(),
        });
    }
    if s.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: format!("must not exceed {MAX_IDENTIFIER_LEN} characters"),
        });
    }
    if s.chars().any(char::is_control) {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: "must not contain control characters".into(),
        });
    }
    Ok(())
}

impl Vin {
    /// Validate and normalize a VIN.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let s = raw.as_ref().trim().to_ascii_uppercase();
        check_common("vin", &s)?;
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(CoreError::InvalidIdentifier {
                kind: "vin",
                reason: format!("{s:?} contains characters outside [A-Z0-9-]"),
            });
        }
        Ok(Self(s))
    }

    /// The normalized VIN.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OwnerEmail {
    /// Validate and normalize an e-mail address.
    ///
    /// Only the shape `local@domain` is checked; deliverability is the
    /// notification collaborator's concern.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let s = raw.as_ref().trim().to_lowercase();
        check_common("email", &s)?;
        match s.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => {
                return Err(CoreError::InvalidIdentifier {
                    kind: "email",
                    reason: format!("{s:?} is not of the form local@domain"),
                })
            }
        }
        if s.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidIdentifier {
                kind: "email",
                reason: "must not contain whitespace".into(),
            });
        }
        Ok(Self(s))
    }

    /// The normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PlateNumber {
    /// Validate and normalize a plate number.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let s: String = raw
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        check_common("plate", &s)?;
        Ok(Self(s))
    }

    /// The normalized plate.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TxId {
    /// Wrap a backend-assigned transaction id.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh random id (64 hex chars, the same width as a
    /// SHA-256 transaction id on a real network).
    pub fn generate() -> Self {
        let a = uuid::Uuid::new_v4().simple().to_string();
        let b = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{a}{b}"))
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_impls {
    ($t:ty) => {
        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = CoreError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$t> for String {
            fn from(v: $t) -> String {
                v.0
            }
        }

        impl std::str::FromStr for $t {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

string_newtype_impls!(Vin);
string_newtype_impls!(OwnerEmail);
string_newtype_impls!(PlateNumber);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
