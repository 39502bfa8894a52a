//! # vledger-cli: Vehicle Ledger CLI
//!
//! Provides the `vledger` command-line interface over the gateway.
//!
//! ## Subcommands
//!
//! - `vledger invoke`: submit a state-changing function.
//! - `vledger query`: evaluate a read-only function.
//! - `vledger chain show|verify|stats`: inspect the block chain.
//!
//! Global flags: `--org <ORG>` selects the calling organization (MSP id or
//! short name), `--config <FILE>` names a YAML config file, `--log-json`
//! switches logs to JSON.

pub mod call;
pub mod chain;

use vledger_core::Organization;

/// Parse an organization from an MSP id (`RegistrarMSP`) or short name
/// (`registrar`).
pub fn parse_org(raw: &str) -> Result<Organization, String> {
    raw.parse::<Organization>().map_err(|e| {
        let known: Vec<&str> = Organization::ALL.iter().map(|o| o.short_name()).collect();
        format!("{e}; expected one of {}", known.join(", "))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_org_accepts_msp_and_short_names() {
        assert_eq!(parse_org("RegistrarMSP").unwrap(), Organization::Registrar);
        assert_eq!(parse_org("enforcement").unwrap(), Organization::Enforcement);
        let err = parse_org("police").unwrap_err();
        assert!(err.contains("expected one of"));
    }
}
