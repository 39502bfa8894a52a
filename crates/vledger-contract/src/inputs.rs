//! # Operation Inputs
//!
//! Caller-supplied JSON shapes. They arrive loosely typed and are validated
//! into domain types inside the operation, after the authorization check.

use serde::{Deserialize, Serialize};
use vledger_core::{OwnerEmail, PlateNumber, Vin};
use vledger_state::{Owner, VehicleDetails};

use crate::error::LedgerError;

/// Owner as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl OwnerInput {
    /// Validate into an [`Owner`]. Email and name are required.
    pub fn validate(self) -> Result<Owner, LedgerError> {
        let email = OwnerEmail::new(&self.email)?;
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::InvalidArgument("owner name is required".into()));
        }
        Ok(Owner {
            email,
            name,
            id: self.id.filter(|id| !id.trim().is_empty()),
        })
    }
}

/// Vehicle data for `RegisterVehicle` and `MintVehicle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInput {
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(flatten)]
    pub details: VehicleDetails,
    #[serde(default)]
    pub owner: Option<OwnerInput>,
}

/// A validated [`VehicleInput`] without its owner.
#[derive(Debug, Clone)]
pub(crate) struct ValidVehicle {
    pub vin: Vin,
    pub plate: Option<PlateNumber>,
    pub details: VehicleDetails,
}

impl VehicleInput {
    /// Validate VIN, plate and the required descriptive fields.
    pub(crate) fn validate(&self) -> Result<ValidVehicle, LedgerError> {
        let vin = Vin::new(&self.vin)?;
        let plate = self
            .plate_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PlateNumber::new)
            .transpose()?;
        let mut details = self.details.clone();
        details.make = details.make.trim().to_string();
        details.model = details.model.trim().to_string();
        if details.make.is_empty() {
            return Err(LedgerError::InvalidArgument("make is required".into()));
        }
        if details.model.is_empty() {
            return Err(LedgerError::InvalidArgument("model is required".into()));
        }
        if details.year == 0 {
            return Err(LedgerError::InvalidArgument("year is required".into()));
        }
        Ok(ValidVehicle {
            vin,
            plate,
            details,
        })
    }
}

/// Transfer precondition and annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    /// Owner the caller believes is current; checked against the record.
    #[serde(default, alias = "currentOwner")]
    pub current_owner_email: String,
    #[serde(default)]
    pub reason: Option<String>,
}
