//! # vledger CLI entry point
//!
//! Parses command-line arguments, loads the gateway configuration, and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vledger_cli::call::{exit_code, run_invoke, run_query, CallArgs};
use vledger_cli::chain::{chain_exit_code, run_chain, ChainArgs};
use vledger_cli::parse_org;
use vledger_core::Organization;
use vledger_gateway::{Gateway, GatewayConfig};

/// Permissioned vehicle-asset ledger.
///
/// Calls go through the gateway: the local chain emulator under the data
/// directory, or a remote ledger network when `VLEDGER_NETWORK_URL` is set.
#[derive(Parser, Debug)]
#[command(name = "vledger", version, about, long_about = None)]
struct Cli {
    /// Calling organization (MSP id or short name).
    #[arg(long, global = true, default_value = "registrar", value_parser = parse_org)]
    org: Organization,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a state-changing contract function.
    Invoke(CallArgs),

    /// Evaluate a read-only contract function.
    Query(CallArgs),

    /// Inspect and verify the block chain.
    Chain(ChainArgs),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = GatewayConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(?config, "configuration loaded");
    let gateway = Gateway::connect(&config).context("initializing gateway")?;

    let (code, envelope) = match &cli.command {
        Commands::Invoke(args) => {
            let env = run_invoke(&gateway, cli.org, args).await?;
            (exit_code(&env), env)
        }
        Commands::Query(args) => {
            let env = run_query(&gateway, cli.org, args).await?;
            (exit_code(&env), env)
        }
        Commands::Chain(args) => {
            let env = run_chain(&gateway, cli.org, args).await?;
            (chain_exit_code(&args.command, &env), env)
        }
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
