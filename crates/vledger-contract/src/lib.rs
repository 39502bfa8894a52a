//! # vledger-contract: Vehicle Ledger Contract
//!
//! The ledger's public operations over the state machine in
//! `vledger-state`, the persistence in `vledger-store` and the chain
//! emulator in `vledger-chain`.
//!
//! ## Modules
//!
//! - **Authorization** (`auth.rs`): category × organization table, checked
//!   before any state is read.
//! - **Ledger** (`ledger.rs`): [`Ledger`] with every mutating operation and
//!   query. Mutations run through one commit pipeline under a writer lock.
//! - **Events** (`events.rs`): one [`LedgerEvent`] per committed mutation.
//! - **Inputs** (`inputs.rs`) and **Queries** (`queries.rs`): caller-facing
//!   shapes.
//! - **Errors** (`error.rs`): [`LedgerError`] with stable machine codes.
//!
//! ## Crate Policy
//!
//! - Callers identify themselves by [`Organization`](vledger_core::Organization);
//!   the ledger does not authenticate.
//! - A failed operation leaves no trace: no record change, no index change,
//!   no transaction, no event.

pub mod auth;
pub mod error;
pub mod events;
pub mod inputs;
pub mod ledger;
pub mod queries;

pub use auth::{authorized_organizations, is_authorized, OperationCategory};
pub use error::LedgerError;
pub use events::{EventKind, EventLog, LedgerEvent};
pub use inputs::{OwnerInput, TransferInput, VehicleInput};
pub use ledger::{Committed, Ledger, LedgerOptions};
pub use queries::{OwnerProfile, SystemStats, TransactionReceipt};
