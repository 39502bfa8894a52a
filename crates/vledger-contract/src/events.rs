//! # Ledger Events
//!
//! Every committed mutation emits exactly one named event carrying the VIN,
//! the relevant fields, the timestamp and the transaction id. Events are the
//! audit surface consumed by notification and activity-log collaborators.
//!
//! The [`EventLog`] keeps the most recent events in a bounded buffer
//! (oldest 10% trimmed when full) and fans each one out to live subscribers
//! over a `tokio::sync::broadcast` channel. A subscriber that falls behind
//! loses the oldest events, never blocks the writer.

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use vledger_core::{Organization, Timestamp, TxId, Vin};

/// Event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    VehicleMinted,
    Registered,
    VerificationUpdated,
    OwnershipTransferred,
    VehicleUpdated,
    VehicleDeleted,
    ViolationReported,
    VehicleStolen,
    VehicleRecovered,
}

impl EventKind {
    /// Event name as emitted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehicleMinted => "VehicleMinted",
            Self::Registered => "Registered",
            Self::VerificationUpdated => "VerificationUpdated",
            Self::OwnershipTransferred => "OwnershipTransferred",
            Self::VehicleUpdated => "VehicleUpdated",
            Self::VehicleDeleted => "VehicleDeleted",
            Self::ViolationReported => "ViolationReported",
            Self::VehicleStolen => "VehicleStolen",
            Self::VehicleRecovered => "VehicleRecovered",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub name: EventKind,
    pub vin: Vin,
    pub tx_id: TxId,
    pub timestamp: Timestamp,
    pub organization: Organization,
    /// Event-specific fields.
    pub payload: Value,
}

/// Bounded in-memory event log with broadcast fan-out.
#[derive(Debug)]
pub struct EventLog {
    entries: RwLock<VecDeque<LedgerEvent>>,
    capacity: usize,
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventLog {
    /// Default number of retained events.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// A log retaining at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity.min(1024));
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity,
            sender,
        }
    }

    /// Record an event and deliver it to current subscribers.
    pub fn publish(&self, event: LedgerEvent) {
        {
            let mut entries = self.entries.write();
            entries.push_back(event.clone());
            if entries.len() > self.capacity {
                let trim = (self.capacity / 10).max(1);
                entries.drain(..trim);
            }
        }
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// A receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Retained events, oldest first, optionally for one VIN.
    pub fn events(&self, vin: Option<&Vin>) -> Vec<LedgerEvent> {
        self.entries
            .read()
            .iter()
            .filter(|e| vin.map_or(true, |v| &e.vin == v))
            .cloned()
            .collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
