//! # Query Projections
//!
//! Read-only result shapes. None of these touch the writer lock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vledger_chain::{ChainStats, Transaction};
use vledger_core::Vin;
use vledger_state::{Owner, VehicleRecord, VehicleStatus, VerificationState};

/// `GetSystemStats` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_vehicles: usize,
    /// Record count per status; every stored status is present.
    pub by_status: BTreeMap<String, usize>,
    /// Registered records with at least one gate still `PENDING`.
    pub pending_verification: usize,
    /// Registered records with at least one gate `REJECTED`.
    pub rejected_verification: usize,
    pub stolen: usize,
    pub total_violations: usize,
    pub total_owners: usize,
    pub chain: ChainStats,
}

impl SystemStats {
    pub(crate) fn aggregate(records: &[VehicleRecord], total_owners: usize, chain: ChainStats) -> Self {
        let mut by_status: BTreeMap<String, usize> = VehicleStatus::STORED
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut pending = 0;
        let mut rejected = 0;
        let mut violations = 0;
        for r in records {
            *by_status.entry(r.status.as_str().to_string()).or_default() += 1;
            if r.status == VehicleStatus::Registered {
                if r.verification_status.any(VerificationState::Pending) {
                    pending += 1;
                }
                if r.verification_status.any(VerificationState::Rejected) {
                    rejected += 1;
                }
            }
            violations += r.violations.len();
        }
        Self {
            total_vehicles: records.len(),
            stolen: by_status.get(VehicleStatus::Stolen.as_str()).copied().unwrap_or(0),
            by_status,
            pending_verification: pending,
            rejected_verification: rejected,
            total_violations: violations,
            total_owners,
            chain,
        }
    }
}

/// `GetOwner` result: the stored profile plus the VINs currently indexed to
/// the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    #[serde(flatten)]
    pub owner: Owner,
    pub vehicles: Vec<Vin>,
}

/// `GetTransaction` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction: Transaction,
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vledger_core::{Organization, OwnerEmail, Timestamp, TxId};
    use vledger_state::{TransitionContext, VehicleDetails};

    fn chain_stats() -> ChainStats {
        ChainStats {
            height: 0,
            blocks: 1,
            transactions: 0,
            difficulty: 1,
            batch_size: 10,
            latest_block_hash: String::new(),
        }
    }

    #[test]
    fn test_aggregate_counts() {
        let ctx = TransitionContext::new(TxId::generate(), Timestamp::now(), Organization::Registrar);
        let owner = Owner {
            email: OwnerEmail::new("a@b.c").unwrap(),
            name: "A".into(),
            id: None,
        };
        let details = VehicleDetails {
            make: "M".into(),
            model: "X".into(),
            year: 2020,
            ..Default::default()
        };
        let a = VehicleRecord::register(Vin::new("A").unwrap(), None, details.clone(), owner, &ctx);
        let b = VehicleRecord::mint(Vin::new("B").unwrap(), None, details, &ctx);
        let stats = SystemStats::aggregate(&[a, b], 1, chain_stats());
        assert_eq!(stats.total_vehicles, 2);
        assert_eq!(stats.by_status["REGISTERED"], 1);
        assert_eq!(stats.by_status["MINTED"], 1);
        assert_eq!(stats.by_status["APPROVED"], 0);
        assert_eq!(stats.pending_verification, 1);
        assert_eq!(stats.stolen, 0);
    }
}
