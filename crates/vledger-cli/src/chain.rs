//! # Chain Subcommand
//!
//! Inspect the ledger's block chain through the gateway, so the same
//! commands work against the local emulator and a remote network.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use vledger_core::Organization;
use vledger_gateway::{Gateway, LedgerFunction};

/// Arguments for `vledger chain`.
#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommand,
}

/// Chain subcommands.
#[derive(Subcommand, Debug)]
pub enum ChainCommand {
    /// Print one block, or the latest block when no number is given.
    Show {
        #[arg(value_name = "BLOCK")]
        number: Option<u64>,
    },
    /// Re-derive every hash, link, Merkle root and proof-of-work target.
    Verify,
    /// Height, transaction count, difficulty.
    Stats,
}

/// Execute a chain subcommand and return the envelope.
pub async fn run_chain(gateway: &Gateway, org: Organization, args: &ChainArgs) -> Result<Value> {
    let (function, call_args) = match &args.command {
        ChainCommand::Show { number: Some(n) } => (LedgerFunction::GetBlock, vec![n.to_string()]),
        ChainCommand::Show { number: None } => (LedgerFunction::GetLatestBlock, Vec::new()),
        ChainCommand::Verify => (LedgerFunction::VerifyChain, Vec::new()),
        ChainCommand::Stats => (LedgerFunction::GetChainStats, Vec::new()),
    };
    let envelope = gateway.evaluate(org, function.name(), call_args).await;

    if let ChainCommand::Verify = args.command {
        let valid = envelope["result"]["valid"].as_bool().unwrap_or(false);
        if !valid {
            tracing::error!(
                failed_block = %envelope["result"]["failedBlock"],
                reason = %envelope["result"]["reason"],
                "chain verification failed"
            );
        }
    }
    if envelope.get("success").and_then(Value::as_bool) != Some(true) {
        let message = envelope["error"]["message"].as_str().unwrap_or("unknown error");
        bail!("{function} failed: {message}");
    }
    Ok(envelope)
}

/// Exit code for a chain command's envelope.
pub fn chain_exit_code(command: &ChainCommand, envelope: &Value) -> u8 {
    match command {
        ChainCommand::Verify if envelope["result"]["valid"] != Value::Bool(true) => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_chain_is_valid() {
        let (_dir, gw) = crate::tests_support::local_gateway();
        let args = ChainArgs {
            command: ChainCommand::Verify,
        };
        let env = run_chain(&gw, Organization::Registrar, &args).await.unwrap();
        assert_eq!(env["result"]["valid"], true);
        assert_eq!(chain_exit_code(&args.command, &env), 0);
    }

    #[tokio::test]
    async fn test_show_genesis_and_missing_block() {
        let (_dir, gw) = crate::tests_support::local_gateway();
        let show = |number| ChainArgs {
            command: ChainCommand::Show { number },
        };
        let env = run_chain(&gw, Organization::Registrar, &show(None))
            .await
            .unwrap();
        assert_eq!(env["result"]["blockNumber"], 0);
        assert!(run_chain(&gw, Organization::Registrar, &show(Some(5)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let (_dir, gw) = crate::tests_support::local_gateway();
        let args = ChainArgs {
            command: ChainCommand::Stats,
        };
        let env = run_chain(&gw, Organization::Registrar, &args).await.unwrap();
        assert_eq!(env["result"]["height"], 0);
        assert_eq!(env["result"]["difficulty"], 1);
    }
}
