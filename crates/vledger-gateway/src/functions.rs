//! # Contract Functions
//!
//! The `(functionName, args)` call surface. Each argument is a string; object
//! arguments are JSON-encoded. Arguments are parsed here and any parse
//! failure is reported as `INVALID_ARGUMENT`.
//!
//! | Function | Arguments |
//! |----------|-----------|
//! | `MintVehicle` | vehicle JSON (no owner) |
//! | `RegisterVehicle` | vehicle JSON with `owner` |
//! | `UpdateVerificationStatus` | vin, verifier kind, status, notes? |
//! | `TransferOwnership` | vin, new owner JSON, transfer JSON |
//! | `UpdateVehicle` | vin, updates JSON |
//! | `ChangePlate` | vin, plate |
//! | `DeleteVehicle` | vin |
//! | `ReportViolation` | vin, violation JSON |
//! | `ReportStolen` | vin, report JSON? |
//! | `MarkRecovered` | vin, recovery JSON? |
//! | `GetVehicle` / `GetVehicleHistory` | vin |
//! | `GetVehiclesByStatus` | status |
//! | `GetVehiclesByVerificationStatus` | verifier kind, status |
//! | `GetVehiclesByOwner` / `GetOwner` | email |
//! | `GetVehicleByPlate` | plate |
//! | `GetAllVehicles` / `GetSystemStats` | none |
//! | `GetEvents` | vin? |
//! | `GetBlock` | block number |
//! | `GetLatestBlock` / `GetChainStats` / `VerifyChain` | none |
//! | `GetTransaction` | transaction id |

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use vledger_contract::{Committed, Ledger, OwnerInput, TransferInput, VehicleInput};
use vledger_core::{Organization, OwnerEmail, PlateNumber, TxId, Vin};
use vledger_state::{
    RecoveryInput, TheftInput, VehicleStatus, VehicleUpdate, VerificationState, VerifierKind,
    ViolationInput,
};

use crate::error::GatewayError;

/// Every callable contract function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFunction {
    MintVehicle,
    RegisterVehicle,
    UpdateVerificationStatus,
    TransferOwnership,
    UpdateVehicle,
    ChangePlate,
    DeleteVehicle,
    ReportViolation,
    ReportStolen,
    MarkRecovered,
    GetVehicle,
    GetVehicleHistory,
    GetVehiclesByStatus,
    GetVehiclesByVerificationStatus,
    GetVehiclesByOwner,
    GetVehicleByPlate,
    GetAllVehicles,
    GetOwner,
    GetSystemStats,
    GetEvents,
    GetBlock,
    GetLatestBlock,
    GetTransaction,
    GetChainStats,
    VerifyChain,
}

impl LedgerFunction {
    pub const ALL: [Self; 25] = [
        Self::MintVehicle,
        Self::RegisterVehicle,
        Self::UpdateVerificationStatus,
        Self::TransferOwnership,
        Self::UpdateVehicle,
        Self::ChangePlate,
        Self::DeleteVehicle,
        Self::ReportViolation,
        Self::ReportStolen,
        Self::MarkRecovered,
        Self::GetVehicle,
        Self::GetVehicleHistory,
        Self::GetVehiclesByStatus,
        Self::GetVehiclesByVerificationStatus,
        Self::GetVehiclesByOwner,
        Self::GetVehicleByPlate,
        Self::GetAllVehicles,
        Self::GetOwner,
        Self::GetSystemStats,
        Self::GetEvents,
        Self::GetBlock,
        Self::GetLatestBlock,
        Self::GetTransaction,
        Self::GetChainStats,
        Self::VerifyChain,
    ];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MintVehicle => "MintVehicle",
            Self::RegisterVehicle => "RegisterVehicle",
            Self::UpdateVerificationStatus => "UpdateVerificationStatus",
            Self::TransferOwnership => "TransferOwnership",
            Self::UpdateVehicle => "UpdateVehicle",
            Self::ChangePlate => "ChangePlate",
            Self::DeleteVehicle => "DeleteVehicle",
            Self::ReportViolation => "ReportViolation",
            Self::ReportStolen => "ReportStolen",
            Self::MarkRecovered => "MarkRecovered",
            Self::GetVehicle => "GetVehicle",
            Self::GetVehicleHistory => "GetVehicleHistory",
            Self::GetVehiclesByStatus => "GetVehiclesByStatus",
            Self::GetVehiclesByVerificationStatus => "GetVehiclesByVerificationStatus",
            Self::GetVehiclesByOwner => "GetVehiclesByOwner",
            Self::GetVehicleByPlate => "GetVehicleByPlate",
            Self::GetAllVehicles => "GetAllVehicles",
            Self::GetOwner => "GetOwner",
            Self::GetSystemStats => "GetSystemStats",
            Self::GetEvents => "GetEvents",
            Self::GetBlock => "GetBlock",
            Self::GetLatestBlock => "GetLatestBlock",
            Self::GetTransaction => "GetTransaction",
            Self::GetChainStats => "GetChainStats",
            Self::VerifyChain => "VerifyChain",
        }
    }

    /// Whether the function is read-only.
    pub fn is_query(&self) -> bool {
        !matches!(
            self,
            Self::MintVehicle
                | Self::RegisterVehicle
                | Self::UpdateVerificationStatus
                | Self::TransferOwnership
                | Self::UpdateVehicle
                | Self::ChangePlate
                | Self::DeleteVehicle
                | Self::ReportViolation
                | Self::ReportStolen
                | Self::MarkRecovered
        )
    }
}

impl std::fmt::Display for LedgerFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LedgerFunction {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GatewayError::UnknownFunction(wanted.to_string()))
    }
}

/// Result of a locally executed function.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: Value,
    /// Set for committed mutations.
    pub tx_id: Option<TxId>,
    pub block_number: Option<u64>,
}

impl Outcome {
    fn query<T: Serialize>(value: &T) -> Result<Self, GatewayError> {
        Ok(Self {
            result: serde_json::to_value(value)?,
            tx_id: None,
            block_number: None,
        })
    }

    fn committed<T: Serialize>(c: Committed<T>) -> Result<Self, GatewayError> {
        Ok(Self {
            result: serde_json::to_value(&c.value)?,
            tx_id: Some(c.tx_id),
            block_number: Some(c.block_number),
        })
    }
}

// ─── Argument parsing ────────────────────────────────────────────────

struct Args<'a> {
    function: LedgerFunction,
    raw: &'a [String],
}

impl<'a> Args<'a> {
    fn optional(&self, i: usize) -> Option<&'a str> {
        self.raw
            .get(i)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    fn required(&self, i: usize, name: &str) -> Result<&'a str, GatewayError> {
        self.optional(i).ok_or_else(|| {
            GatewayError::invalid_argument(format!(
                "{} requires argument {} ({name})",
                self.function,
                i + 1
            ))
        })
    }

    fn parse<T>(&self, i: usize, name: &str) -> Result<T, GatewayError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.required(i, name)?
            .parse()
            .map_err(|e| GatewayError::invalid_argument(format!("{name}: {e}")))
    }

    fn json<T: DeserializeOwned>(&self, i: usize, name: &str) -> Result<T, GatewayError> {
        serde_json::from_str(self.required(i, name)?)
            .map_err(|e| GatewayError::invalid_argument(format!("{name} is not valid JSON: {e}")))
    }

    fn json_or_default<T: DeserializeOwned + Default>(
        &self,
        i: usize,
        name: &str,
    ) -> Result<T, GatewayError> {
        match self.optional(i) {
            Some(_) => self.json(i, name),
            None => Ok(T::default()),
        }
    }

    fn vin(&self) -> Result<Vin, GatewayError> {
        self.parse(0, "vin")
    }
}

/// Run `function` against a local ledger.
pub fn execute(
    ledger: &Ledger,
    caller: Organization,
    function: LedgerFunction,
    args: &[String],
) -> Result<Outcome, GatewayError> {
    use LedgerFunction as F;

    let a = Args {
        function,
        raw: args,
    };
    match function {
        F::MintVehicle => {
            Outcome::committed(ledger.mint_vehicle(caller, a.json::<VehicleInput>(0, "vehicle")?)?)
        }
        F::RegisterVehicle => Outcome::committed(
            ledger.register_vehicle(caller, a.json::<VehicleInput>(0, "vehicle")?)?,
        ),
        F::UpdateVerificationStatus => {
            let vin = a.vin()?;
            let kind: VerifierKind = a.parse(1, "verifierType")?;
            let state: VerificationState = a.parse(2, "status")?;
            let notes = a.optional(3).map(str::to_string);
            Outcome::committed(ledger.update_verification_status(caller, &vin, kind, state, notes)?)
        }
        F::TransferOwnership => {
            let vin = a.vin()?;
            let new_owner: OwnerInput = a.json(1, "newOwner")?;
            let transfer: TransferInput = a.json(2, "transferData")?;
            Outcome::committed(ledger.transfer_ownership(caller, &vin, new_owner, transfer)?)
        }
        F::UpdateVehicle => {
            let vin = a.vin()?;
            let update: VehicleUpdate = a.json(1, "updates")?;
            Outcome::committed(ledger.update_vehicle(caller, &vin, update)?)
        }
        F::ChangePlate => {
            let vin = a.vin()?;
            let plate: PlateNumber = a.parse(1, "plateNumber")?;
            Outcome::committed(ledger.change_plate(caller, &vin, plate)?)
        }
        F::DeleteVehicle => Outcome::committed(ledger.delete_vehicle(caller, &a.vin()?)?),
        F::ReportViolation => {
            let vin = a.vin()?;
            let input: ViolationInput = a.json(1, "violation")?;
            Outcome::committed(ledger.report_violation(caller, &vin, input)?)
        }
        F::ReportStolen => {
            let vin = a.vin()?;
            let input: TheftInput = a.json_or_default(1, "report")?;
            Outcome::committed(ledger.report_stolen(caller, &vin, input)?)
        }
        F::MarkRecovered => {
            let vin = a.vin()?;
            let input: RecoveryInput = a.json_or_default(1, "recovery")?;
            Outcome::committed(ledger.mark_recovered(caller, &vin, input)?)
        }
        F::GetVehicle => Outcome::query(&ledger.get_vehicle(&a.vin()?)?),
        F::GetVehicleHistory => Outcome::query(&ledger.get_vehicle_history(&a.vin()?)?),
        F::GetVehiclesByStatus => {
            let status: VehicleStatus = a.parse(0, "status")?;
            Outcome::query(&ledger.get_vehicles_by_status(status)?)
        }
        F::GetVehiclesByVerificationStatus => {
            let kind: VerifierKind = a.parse(0, "verifierType")?;
            let state: VerificationState = a.parse(1, "status")?;
            Outcome::query(&ledger.get_vehicles_by_verification_status(kind, state)?)
        }
        F::GetVehiclesByOwner => {
            let email: OwnerEmail = a.parse(0, "email")?;
            Outcome::query(&ledger.get_vehicles_by_owner(&email)?)
        }
        F::GetVehicleByPlate => {
            let plate: PlateNumber = a.parse(0, "plateNumber")?;
            Outcome::query(&ledger.get_vehicle_by_plate(&plate)?)
        }
        F::GetAllVehicles => Outcome::query(&ledger.get_all_vehicles()?),
        F::GetOwner => {
            let email: OwnerEmail = a.parse(0, "email")?;
            Outcome::query(&ledger.get_owner(&email)?)
        }
        F::GetSystemStats => Outcome::query(&ledger.get_system_stats()?),
        F::GetEvents => {
            let vin = a
                .optional(0)
                .map(Vin::new)
                .transpose()
                .map_err(|e| GatewayError::invalid_argument(format!("vin: {e}")))?;
            Outcome::query(&ledger.get_events(vin.as_ref()))
        }
        F::GetBlock => {
            let number: u64 = a.parse(0, "blockNumber")?;
            Outcome::query(&ledger.get_block(number)?)
        }
        F::GetLatestBlock => Outcome::query(&ledger.get_latest_block()),
        F::GetTransaction => {
            let id = TxId::new(a.required(0, "transactionId")?.trim());
            Outcome::query(&ledger.get_transaction(&id)?)
        }
        F::GetChainStats => Outcome::query(&ledger.get_chain_stats()),
        F::VerifyChain => Outcome::query(&ledger.verify_chain()),
    }
}
