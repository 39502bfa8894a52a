//! Typed client for a remote ledger network gateway.
//!
//! Forwards `(function, args)` calls as JSON over HTTP. The network executes
//! the contract itself and answers with the same result envelope the local
//! backend produces, which is passed through unchanged.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/channels/{channel}/contracts/{contract}/submit` | Submit transaction |
//! | POST | `/channels/{channel}/contracts/{contract}/evaluate` | Evaluate query |

use serde::Serialize;
use serde_json::Value;
use url::Url;
use vledger_core::Organization;

use crate::config::NetworkConfig;
use crate::error::GatewayError;

/// Call shape sent to the network.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCall<'a> {
    pub function: &'a str,
    pub args: &'a [String],
    /// MSP id of the calling organization.
    pub organization: &'a str,
}

/// Submit or evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Submit,
    Evaluate,
}

impl CallMode {
    fn path_segment(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Evaluate => "evaluate",
        }
    }
}

/// HTTP client bound to one channel and contract.
#[derive(Debug, Clone)]
pub struct RemoteNetwork {
    http: reqwest::Client,
    base_url: Url,
    channel: String,
    contract: String,
}

impl RemoteNetwork {
    /// Build a client from configuration.
    pub fn new(config: &NetworkConfig) -> Result<Self, GatewayError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| {
                    GatewayError::Config(crate::config::ConfigError::Invalid(
                        "network token contains characters not allowed in a header".into(),
                    ))
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.url.clone(),
            channel: config.channel.clone(),
            contract: config.contract.clone(),
        })
    }

    /// Base URL of the network gateway.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Forward one call.
    ///
    /// Calls `POST {base_url}/channels/{channel}/contracts/{contract}/{mode}`.
    pub async fn call(
        &self,
        mode: CallMode,
        caller: Organization,
        function: &str,
        args: &[String],
    ) -> Result<Value, GatewayError> {
        let endpoint = format!("POST {}/{function}", mode.path_segment());
        let url = format!(
            "{}/channels/{}/contracts/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.channel,
            self.contract,
            mode.path_segment()
        );
        let body = RemoteCall {
            function,
            args,
            organization: caller.msp_id(),
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Remote {
                endpoint,
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| GatewayError::Deserialization {
            endpoint,
            source: e,
        })
    }
}
