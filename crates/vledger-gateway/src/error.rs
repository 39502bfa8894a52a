//! Gateway error types.

use vledger_contract::LedgerError;

use crate::config::ConfigError;

/// Errors from gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The contract rejected the call.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No contract function by this name.
    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    /// A state-changing function was passed to `evaluate`.
    #[error("{0} changes ledger state; submit it instead")]
    NotAQuery(String),

    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The ledger network returned a non-2xx status.
    #[error("ledger network {endpoint} returned {status}: {body}")]
    Remote {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A local result could not be encoded.
    #[error("failed to encode result: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The blocking task running a local call panicked or was cancelled.
    #[error("local backend task failed: {0}")]
    Task(String),
}

impl GatewayError {
    /// Stable machine code for the failure envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.code(),
            Self::UnknownFunction(_) => "UNKNOWN_FUNCTION",
            Self::NotAQuery(_) => "INVALID_ARGUMENT",
            Self::Http { .. } => "NETWORK_ERROR",
            Self::Remote { .. } | Self::Deserialization { .. } => "REMOTE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Encoding(_) | Self::Task(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::Ledger(LedgerError::InvalidArgument(msg.into()))
    }
}
