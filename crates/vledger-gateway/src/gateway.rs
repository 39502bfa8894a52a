//! # Gateway
//!
//! One interface, `submit` / `evaluate` over `(function, args)`, in front of
//! whichever backend was selected at construction. Callers never see which
//! backend served a call; both produce the same JSON envelope:
//!
//! ```text
//! { "success": true,  "result": <payload>, "transactionId": "..", "blockNumber": n }
//! { "success": false, "error": { "code": "NOT_FOUND", "message": ".." } }
//! ```
//!
//! `transactionId` and `blockNumber` are present only for committed
//! mutations. Local calls run on the blocking pool because a block seal may
//! spend its whole proof-of-work budget.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use vledger_contract::Ledger;
use vledger_core::Organization;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::functions::{self, LedgerFunction, Outcome};
use crate::remote::{CallMode, RemoteNetwork};

/// The backend serving calls.
#[derive(Debug, Clone)]
pub enum Backend {
    /// In-process contract over the local chain emulator.
    Local(Arc<Ledger>),
    /// A remote ledger network.
    Network(RemoteNetwork),
}

/// Entry point for ledger calls.
#[derive(Debug, Clone)]
pub struct Gateway {
    backend: Backend,
}

impl Gateway {
    /// Select and initialize the backend named by `config`.
    pub fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let backend = match &config.network {
            Some(net) => {
                tracing::info!(
                    url = %net.url,
                    channel = %net.channel,
                    contract = %net.contract,
                    "using remote ledger network"
                );
                Backend::Network(RemoteNetwork::new(net)?)
            }
            None => {
                tracing::info!(
                    data_dir = %config.data_dir.display(),
                    difficulty = config.chain.difficulty,
                    batch_size = config.chain.batch_size,
                    "using local chain emulator"
                );
                let ledger = Ledger::open(&config.data_dir, config.ledger_options())?;
                Backend::Local(Arc::new(ledger))
            }
        };
        Ok(Self { backend })
    }

    /// A gateway over an existing local ledger.
    pub fn local(ledger: Arc<Ledger>) -> Self {
        Self {
            backend: Backend::Local(ledger),
        }
    }

    /// A gateway over a remote network.
    pub fn remote(network: RemoteNetwork) -> Self {
        Self {
            backend: Backend::Network(network),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The local ledger, when that backend is active.
    pub fn ledger(&self) -> Option<&Arc<Ledger>> {
        match &self.backend {
            Backend::Local(l) => Some(l),
            Backend::Network(_) => None,
        }
    }

    /// Run a transaction and return the result envelope.
    pub async fn submit(&self, caller: Organization, function: &str, args: Vec<String>) -> Value {
        let result = self.call(CallMode::Submit, caller, function, args).await;
        let outcome = match &result {
            Ok(v) if is_success(v) => "ok",
            _ => "error",
        };
        metrics::counter!(
            "vledger_submit_total",
            "function" => metric_label(function),
            "outcome" => outcome
        )
        .increment(1);
        into_envelope(function, result)
    }

    /// Run a read-only query and return the result envelope.
    pub async fn evaluate(&self, caller: Organization, function: &str, args: Vec<String>) -> Value {
        metrics::counter!("vledger_evaluate_total", "function" => metric_label(function))
            .increment(1);
        let result = self.call(CallMode::Evaluate, caller, function, args).await;
        into_envelope(function, result)
    }

    /// Dispatch without wrapping failures into an envelope.
    pub async fn call(
        &self,
        mode: CallMode,
        caller: Organization,
        function: &str,
        args: Vec<String>,
    ) -> Result<Value, GatewayError> {
        match &self.backend {
            Backend::Local(ledger) => {
                let f: LedgerFunction = function.parse()?;
                if mode == CallMode::Evaluate && !f.is_query() {
                    return Err(GatewayError::NotAQuery(f.name().to_string()));
                }
                tracing::debug!(function = f.name(), organization = %caller, "local call");
                let ledger = Arc::clone(ledger);
                let outcome = tokio::task::spawn_blocking(move || {
                    functions::execute(&ledger, caller, f, &args)
                })
                .await
                .map_err(|e| GatewayError::Task(e.to_string()))??;
                Ok(success_envelope(outcome))
            }
            Backend::Network(net) => net.call(mode, caller, function, &args).await,
        }
    }
}

fn metric_label(function: &str) -> &'static str {
    function
        .parse::<LedgerFunction>()
        .map(|f| f.name())
        .unwrap_or("unknown")
}

fn is_success(v: &Value) -> bool {
    v.get("success").and_then(Value::as_bool).unwrap_or(false)
}

/// Wrap a local outcome.
pub fn success_envelope(outcome: Outcome) -> Value {
    let mut map = Map::new();
    map.insert("success".into(), Value::Bool(true));
    map.insert("result".into(), outcome.result);
    if let Some(tx) = outcome.tx_id {
        map.insert("transactionId".into(), Value::String(tx.to_string()));
    }
    if let Some(n) = outcome.block_number {
        map.insert("blockNumber".into(), Value::from(n));
    }
    Value::Object(map)
}

/// Wrap a failure.
pub fn failure_envelope(err: &GatewayError) -> Value {
    json!({
        "success": false,
        "error": { "code": err.code(), "message": err.to_string() },
    })
}

fn into_envelope(function: &str, result: Result<Value, GatewayError>) -> Value {
    match result {
        Ok(v) => v,
        Err(e) => {
            // Contract rejections are already logged by the ledger.
            if !matches!(e, GatewayError::Ledger(_)) {
                tracing::warn!(function, code = e.code(), error = %e, "gateway call failed");
            }
            failure_envelope(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vledger_chain::ChainConfig;
    use vledger_contract::LedgerOptions;

    fn gateway() -> Gateway {
        let ledger = Ledger::in_memory(LedgerOptions {
            chain: ChainConfig {
                difficulty: 1,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        Gateway::local(Arc::new(ledger))
    }

    fn vehicle() -> String {
        json!({
            "vin": "1HGCM82633A004352",
            "make": "Honda",
            "model": "Accord",
            "year": 2003,
            "owner": {"email": "alice@example.com", "name": "Alice"}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_submit_success_envelope() {
        let gw = gateway();
        let env = gw
            .submit(Organization::Registrar, "RegisterVehicle", vec![vehicle()])
            .await;
        assert_eq!(env["success"], true);
        assert_eq!(env["result"]["vin"], "1HGCM82633A004352");
        assert_eq!(env["transactionId"].as_str().unwrap().len(), 64);
        assert_eq!(env["blockNumber"], 1);
    }

    #[tokio::test]
    async fn test_failure_envelope_carries_code() {
        let gw = gateway();
        let env = gw
            .submit(Organization::Insurer, "RegisterVehicle", vec![vehicle()])
            .await;
        assert_eq!(env["success"], false);
        assert_eq!(env["error"]["code"], "UNAUTHORIZED");
        assert!(env["error"]["message"].as_str().unwrap().contains("InsurerMSP"));

        let env = gw
            .evaluate(Organization::Registrar, "GetVehicle", vec!["NOPE1".into()])
            .await;
        assert_eq!(env["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_evaluate_refuses_mutations() {
        let gw = gateway();
        let env = gw
            .evaluate(Organization::Registrar, "RegisterVehicle", vec![vehicle()])
            .await;
        assert_eq!(env["error"]["code"], "INVALID_ARGUMENT");
        let stats = gw
            .evaluate(Organization::Registrar, "GetSystemStats", vec![])
            .await;
        assert_eq!(stats["result"]["totalVehicles"], 0);
        assert!(stats.get("transactionId").is_none());
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let gw = gateway();
        let env = gw.submit(Organization::Registrar, "DropTables", vec![]).await;
        assert_eq!(env["error"]["code"], "UNKNOWN_FUNCTION");
    }

    #[test]
    fn test_connect_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig {
            data_dir: dir.path().to_path_buf(),
            chain: ChainConfig {
                difficulty: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let gw = Gateway::connect(&config).unwrap();
        assert!(gw.ledger().is_some());
    }
}
