//! # Transactions
//!
//! A transaction records one committed state-machine call: its function
//! name, the effective input and result, and when it was ordered. Its hash
//! is the SHA-256 of the canonical JSON of `{id, type, payload, timestamp}`;
//! the random transaction id is the uniqueness salt, so two identical calls
//! never share a hash.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vledger_core::{sha256_hex, CanonicalBytes, CanonicalizationError, Timestamp, TxId};

/// An immutable, hashed ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id, also the hash salt.
    pub id: TxId,
    /// Function name of the call (e.g. `RegisterVehicle`).
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Effective input and output of the call.
    pub payload: Value,
    /// Content hash, lowercase hex.
    pub hash: String,
    /// Ordering time.
    pub timestamp: Timestamp,
}

#[derive(Serialize)]
struct HashPreimage<'a> {
    id: &'a TxId,
    #[serde(rename = "type")]
    tx_type: &'a str,
    payload: &'a Value,
    timestamp: &'a Timestamp,
}

impl Transaction {
    /// Build and hash a transaction.
    pub fn new(
        id: TxId,
        tx_type: impl Into<String>,
        payload: Value,
        timestamp: Timestamp,
    ) -> Result<Self, CanonicalizationError> {
        let tx_type = tx_type.into();
        let hash = content_hash(&id, &tx_type, &payload, &timestamp)?;
        Ok(Self {
            id,
            tx_type,
            payload,
            hash,
            timestamp,
        })
    }

    /// Recompute the content hash from the stored fields.
    pub fn compute_hash(&self) -> Result<String, CanonicalizationError> {
        content_hash(&self.id, &self.tx_type, &self.payload, &self.timestamp)
    }
}

fn content_hash(
    id: &TxId,
    tx_type: &str,
    payload: &Value,
    timestamp: &Timestamp,
) -> Result<String, CanonicalizationError> {
    let canonical = CanonicalBytes::new(&HashPreimage {
        id,
        tx_type,
        payload,
        timestamp,
    })?;
    Ok(sha256_hex(&canonical))
}
