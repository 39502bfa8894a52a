//! # vledger-gateway: Gateway Adapter
//!
//! The `(functionName, args)` interface to the vehicle ledger. At
//! construction the [`Gateway`] chooses a backend:
//!
//! - **Local**: the contract in `vledger-contract` over the chain emulator,
//!   persisted under `data_dir`.
//! - **Network**: a remote ledger network reached over HTTP, which runs the
//!   contract itself.
//!
//! ## Metrics
//!
//! `vledger_submit_total{function,outcome}` and
//! `vledger_evaluate_total{function}` through the `metrics` facade. Nothing
//! is exported unless the embedding process installs a recorder.

pub mod config;
pub mod error;
pub mod functions;
pub mod gateway;
pub mod remote;

pub use config::{ConfigError, GatewayConfig, NetworkConfig};
pub use error::GatewayError;
pub use functions::{execute, LedgerFunction, Outcome};
pub use gateway::{failure_envelope, success_envelope, Backend, Gateway};
pub use remote::{CallMode, RemoteNetwork};
