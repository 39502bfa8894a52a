//! # Invoke / Query Subcommands
//!
//! `vledger invoke <function> [args..]` submits a transaction;
//! `vledger query <function> [args..]` evaluates a read-only function. Both
//! print the gateway's JSON envelope and exit non-zero when `success` is
//! false.
//!
//! ```bash
//! vledger --org registrar invoke RegisterVehicle '{"vin":"1HGCM82633A004352",...}'
//! vledger --org insurer invoke UpdateVerificationStatus 1HGCM82633A004352 insurance APPROVED
//! vledger query GetVehicle 1HGCM82633A004352
//! ```

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use vledger_core::Organization;
use vledger_gateway::Gateway;

/// Arguments shared by `invoke` and `query`.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Contract function name (e.g. `RegisterVehicle`, `GetVehicle`).
    #[arg(value_name = "FUNCTION")]
    pub function: String,

    /// Function arguments; objects are passed as JSON strings.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Submit a transaction and return the envelope.
pub async fn run_invoke(gateway: &Gateway, org: Organization, args: &CallArgs) -> Result<Value> {
    Ok(gateway
        .submit(org, &args.function, args.args.clone())
        .await)
}

/// Evaluate a query and return the envelope.
pub async fn run_query(gateway: &Gateway, org: Organization, args: &CallArgs) -> Result<Value> {
    Ok(gateway
        .evaluate(org, &args.function, args.args.clone())
        .await)
}

/// Exit code for an envelope.
pub fn exit_code(envelope: &Value) -> u8 {
    match envelope.get("success").and_then(Value::as_bool) {
        Some(true) => 0,
        _ => 1,
    }
}
