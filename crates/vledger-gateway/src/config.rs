//! Gateway configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `VLEDGER_*` environment variables. A network URL selects the remote
//! backend; without one the local contract and chain emulator serve calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;
use vledger_chain::ChainConfig;
use vledger_contract::LedgerOptions;
use vledger_crypto::MAX_DIFFICULTY;
use vledger_store::StoreOptions;

/// Remote ledger network endpoint.
///
/// Custom `Debug` implementation redacts the `token` field.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub url: Url,
    /// Bearer token, if the network requires one.
    pub token: Option<String>,
    pub channel: String,
    pub contract: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("channel", &self.channel)
            .field("contract", &self.contract)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Resolved gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Store and chain files.
    pub data_dir: PathBuf,
    /// Remote backend; `None` selects the local emulator.
    pub network: Option<NetworkConfig>,
    pub chain: ChainConfig,
    pub store: StoreOptions,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            network: None,
            chain: ChainConfig::default(),
            store: StoreOptions::default(),
        }
    }
}

const DEFAULT_DATA_DIR: &str = "./ledger-data";
const DEFAULT_CHANNEL: &str = "mychannel";
const DEFAULT_CONTRACT: &str = "vehicle-registry";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// YAML file shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    network_url: Option<String>,
    network_token: Option<String>,
    channel: Option<String>,
    contract: Option<String>,
    timeout_secs: Option<u64>,
    pow_difficulty: Option<u32>,
    pow_max_attempts: Option<u64>,
    block_batch_size: Option<usize>,
    snapshot_every: Option<u64>,
}

impl GatewayConfig {
    /// Load from an optional YAML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let yaml = match path {
            Some(p) => Some(std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                path: p.to_path_buf(),
                source,
            })?),
            None => None,
        };
        Self::from_sources(yaml.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from YAML text and an environment lookup. Environment values
    /// override the file.
    pub fn from_sources(
        yaml: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match yaml {
            Some(text) if !text.trim().is_empty() => serde_yaml::from_str(text)?,
            _ => FileConfig::default(),
        };

        let pick = |var: &str, fallback: Option<String>| env(var).or(fallback);
        let parse = |var: &'static str, raw: Option<String>| -> Result<Option<u64>, ConfigError> {
            raw.map(|s| {
                s.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: var,
                    value: s,
                })
            })
            .transpose()
        };

        let defaults = Self::default();
        let data_dir = pick("VLEDGER_DATA_DIR", None)
            .map(PathBuf::from)
            .or(file.data_dir)
            .unwrap_or(defaults.data_dir);

        let network = match pick("VLEDGER_NETWORK_URL", file.network_url) {
            Some(raw) if !raw.trim().is_empty() => {
                let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
                    key: "VLEDGER_NETWORK_URL",
                    reason: e.to_string(),
                })?;
                let timeout_secs = parse(
                    "VLEDGER_TIMEOUT_SECS",
                    env("VLEDGER_TIMEOUT_SECS"),
                )?
                .or(file.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
                Some(NetworkConfig {
                    url,
                    token: pick("VLEDGER_NETWORK_TOKEN", file.network_token)
                        .filter(|t| !t.is_empty()),
                    channel: pick("VLEDGER_CHANNEL", file.channel)
                        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
                    contract: pick("VLEDGER_CONTRACT", file.contract)
                        .unwrap_or_else(|| DEFAULT_CONTRACT.to_string()),
                    timeout_secs,
                })
            }
            _ => None,
        };

        let difficulty = parse("VLEDGER_POW_DIFFICULTY", env("VLEDGER_POW_DIFFICULTY"))?
            .map(|d| u32::try_from(d).unwrap_or(u32::MAX))
            .or(file.pow_difficulty)
            .unwrap_or(defaults.chain.difficulty);
        let max_attempts = parse("VLEDGER_POW_MAX_ATTEMPTS", env("VLEDGER_POW_MAX_ATTEMPTS"))?
            .or(file.pow_max_attempts)
            .unwrap_or(defaults.chain.max_attempts);
        let batch_size = parse("VLEDGER_BLOCK_BATCH_SIZE", env("VLEDGER_BLOCK_BATCH_SIZE"))?
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .or(file.block_batch_size)
            .unwrap_or(defaults.chain.batch_size);
        let snapshot_every = parse("VLEDGER_SNAPSHOT_EVERY", env("VLEDGER_SNAPSHOT_EVERY"))?
            .or(file.snapshot_every)
            .unwrap_or(defaults.store.snapshot_every);

        let config = Self {
            data_dir,
            network,
            chain: ChainConfig {
                difficulty,
                max_attempts,
                batch_size,
                seal_deadline: None,
            },
            store: StoreOptions { snapshot_every },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the emulator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "pow difficulty {} exceeds the maximum of {MAX_DIFFICULTY}",
                self.chain.difficulty
            )));
        }
        if self.chain.max_attempts == 0 {
            return Err(ConfigError::Invalid("pow max attempts must be at least 1".into()));
        }
        if self.chain.batch_size == 0 {
            return Err(ConfigError::Invalid("block batch size must be at least 1".into()));
        }
        if let Some(net) = &self.network {
            if !matches!(net.url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl {
                    key: "VLEDGER_NETWORK_URL",
                    reason: format!("unsupported scheme {:?}", net.url.scheme()),
                });
            }
            if net.timeout_secs == 0 {
                return Err(ConfigError::Invalid("timeout must be at least 1 second".into()));
            }
        }
        Ok(())
    }

    /// Options for the local ledger.
    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            chain: self.chain,
            store: self.store,
            event_capacity: 0,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_select_local_backend() {
        let cfg = GatewayConfig::from_sources(None, env(&[])).unwrap();
        assert!(cfg.network.is_none());
        assert_eq!(cfg.data_dir, PathBuf::from("./ledger-data"));
        assert_eq!(cfg.chain.difficulty, 2);
        assert_eq!(cfg.chain.max_attempts, 5_000_000);
        assert_eq!(cfg.chain.batch_size, 10);
        assert_eq!(cfg.store.snapshot_every, 64);
    }

    #[test]
    fn test_env_overrides_file() {
        let yaml = "data_dir: /var/lib/vledger\npow_difficulty: 3\nchannel: filechannel\n";
        let cfg = GatewayConfig::from_sources(
            Some(yaml),
            env(&[
                ("VLEDGER_POW_DIFFICULTY", "1"),
                ("VLEDGER_NETWORK_URL", "https://peer.example.com"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/vledger"));
        assert_eq!(cfg.chain.difficulty, 1);
        let net = cfg.network.unwrap();
        assert_eq!(net.channel, "filechannel");
        assert_eq!(net.contract, "vehicle-registry");
        assert_eq!(net.timeout_secs, 30);
    }

    #[test]
    fn test_difficulty_above_max_rejected() {
        let err = GatewayConfig::from_sources(None, env(&[("VLEDGER_POW_DIFFICULTY", "9")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_numbers_and_urls_rejected() {
        assert!(matches!(
            GatewayConfig::from_sources(None, env(&[("VLEDGER_BLOCK_BATCH_SIZE", "ten")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            GatewayConfig::from_sources(None, env(&[("VLEDGER_NETWORK_URL", "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            GatewayConfig::from_sources(Some("unknown_key: 1\n"), env(&[])),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let cfg = GatewayConfig::from_sources(
            None,
            env(&[
                ("VLEDGER_NETWORK_URL", "http://127.0.0.1:7051"),
                ("VLEDGER_NETWORK_TOKEN", "super-secret"),
            ]),
        )
        .unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
