//! # Local Chain
//!
//! The append-only block list plus a transaction-id lookup table.
//! [`LocalChain`] is a plain owned value; the ledger serializes access to it
//! behind its writer lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vledger_core::TxId;
use vledger_crypto::{meets_difficulty, ProofOfWork, MAX_DIFFICULTY};

use crate::block::{genesis_block, Block};
use crate::error::ChainError;
use crate::transaction::Transaction;

const BLOCKS_FILE: &str = "blocks.json";
const TRANSACTIONS_FILE: &str = "transactions.json";

/// Emulator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Leading zero hex digits required of a sealed block hash.
    pub difficulty: u32,
    /// Nonce search budget per seal.
    pub max_attempts: u64,
    /// Transactions per block.
    pub batch_size: usize,
    /// Optional wall-clock budget per seal.
    #[serde(default)]
    pub seal_deadline: Option<Duration>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            max_attempts: 5_000_000,
            batch_size: 10,
            seal_deadline: None,
        }
    }
}

impl ChainConfig {
    fn proof_of_work(&self) -> Result<ProofOfWork, ChainError> {
        if self.batch_size == 0 {
            return Err(ChainError::InvalidConfig("batch size must be at least 1".into()));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::InvalidConfig(format!(
                "difficulty {} exceeds maximum {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        let pow = ProofOfWork::new(self.difficulty, self.max_attempts)?;
        Ok(match self.seal_deadline {
            Some(d) => pow.with_deadline(d),
            None => pow,
        })
    }
}

/// A sealed tip computed by [`LocalChain::stage`], not yet applied.
#[derive(Debug, Clone)]
pub struct StagedAppend {
    /// The new or re-sealed tip block.
    pub block: Block,
    /// Whether `block` replaces the current open tip rather than extending
    /// the chain.
    pub replaces_tip: bool,
    /// Nonces tried while sealing.
    pub attempts: u64,
    /// Tip hash when this was staged.
    base_tip_hash: String,
}

/// Summary counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    /// Number of the latest block.
    pub height: u64,
    /// Block count including genesis.
    pub blocks: usize,
    /// Transactions across all blocks.
    pub transactions: usize,
    pub difficulty: u32,
    pub batch_size: usize,
    pub latest_block_hash: String,
}

/// Outcome of [`LocalChain::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub valid: bool,
    pub blocks_checked: usize,
    pub transactions_checked: usize,
    /// Number of the first offending block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_block: Option<u64>,
    /// What was wrong with it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The local chain emulator.
#[derive(Debug)]
pub struct LocalChain {
    blocks: Vec<Block>,
    tx_locations: HashMap<TxId, (usize, usize)>,
    config: ChainConfig,
    pow: ProofOfWork,
    dir: Option<PathBuf>,
}

impl LocalChain {
    /// A fresh in-memory chain holding only genesis.
    pub fn in_memory(config: ChainConfig) -> Result<Self, ChainError> {
        let pow = config.proof_of_work()?;
        Ok(Self {
            blocks: vec![genesis_block()?],
            tx_locations: HashMap::new(),
            config,
            pow,
            dir: None,
        })
    }

    /// Load the chain from `dir`, or start one at genesis if none exists.
    pub fn open(dir: impl AsRef<Path>, config: ChainConfig) -> Result<Self, ChainError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| ChainError::io(&dir, e))?;
        let mut chain = Self::in_memory(config)?;
        chain.dir = Some(dir.clone());

        let path = dir.join(BLOCKS_FILE);
        if path.exists() {
            let bytes = fs::read(&path).map_err(|e| ChainError::io(&path, e))?;
            let blocks: Vec<Block> =
                serde_json::from_slice(&bytes).map_err(|e| ChainError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            match blocks.first() {
                Some(first) if first.is_genesis() => {}
                _ => {
                    return Err(ChainError::Corrupt {
                        path,
                        reason: "chain does not start at genesis".into(),
                    })
                }
            }
            chain.blocks = blocks;
            chain.reindex();
        }
        tracing::info!(
            dir = %dir.display(),
            height = chain.height(),
            transactions = chain.tx_locations.len(),
            "local chain opened"
        );
        Ok(chain)
    }

    fn reindex(&mut self) {
        self.tx_locations.clear();
        for (bi, block) in self.blocks.iter().enumerate() {
            for (ti, tx) in block.transactions.iter().enumerate() {
                self.tx_locations.insert(tx.id.clone(), (bi, ti));
            }
        }
    }

    /// Emulator parameters.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Number of the latest block.
    pub fn height(&self) -> u64 {
        self.latest().block_number
    }

    /// The latest block.
    pub fn latest(&self) -> &Block {
        // Never empty: genesis is installed at construction and blocks are
        // never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Block by number.
    pub fn block(&self, number: u64) -> Option<&Block> {
        usize::try_from(number).ok().and_then(|i| self.blocks.get(i))
    }

    /// All blocks in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Transaction by id, with the number of its block.
    pub fn transaction(&self, id: &TxId) -> Option<(&Transaction, u64)> {
        let (bi, ti) = *self.tx_locations.get(id)?;
        let block = self.blocks.get(bi)?;
        Some((block.transactions.get(ti)?, block.block_number))
    }

    /// Total transactions.
    pub fn transaction_count(&self) -> usize {
        self.tx_locations.len()
    }

    /// Summary counters.
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            blocks: self.blocks.len(),
            transactions: self.transaction_count(),
            difficulty: self.config.difficulty,
            batch_size: self.config.batch_size,
            latest_block_hash: self.latest().block_hash.clone(),
        }
    }

    /// Compute the tip that would result from appending `tx`.
    ///
    /// Nothing is mutated; a proof-of-work failure is returned as an error
    /// and the chain is unchanged.
    pub fn stage(&self, tx: Transaction) -> Result<StagedAppend, ChainError> {
        let tip = self.latest();
        let extend_tip = tip.has_room() && tip.transactions.len() < self.config.batch_size;

        let mut block = if extend_tip {
            let mut block = tip.clone();
            block.capacity = block.capacity.min(self.config.batch_size);
            block
        } else {
            Block::open_after(tip, tx.timestamp, self.config.batch_size)
        };
        if tx.timestamp > block.timestamp {
            block.timestamp = tx.timestamp;
        }
        block.transactions.push(tx);

        let solution = block.seal(&self.pow).map_err(|e| {
            tracing::error!(
                block = block.block_number,
                difficulty = self.pow.difficulty,
                error = %e,
                "block sealing failed"
            );
            e
        })?;
        metrics::histogram!("vledger_pow_attempts").record(solution.attempts as f64);

        Ok(StagedAppend {
            block,
            replaces_tip: extend_tip,
            attempts: solution.attempts,
            base_tip_hash: tip.block_hash.clone(),
        })
    }

    /// Install a staged tip.
    ///
    /// Returns an error without mutating if the tip changed since staging.
    pub fn apply(&mut self, staged: StagedAppend) -> Result<&Block, ChainError> {
        if staged.base_tip_hash != self.latest().block_hash {
            return Err(ChainError::StaleAppend {
                staged_on: staged.base_tip_hash,
                tip: self.latest().block_hash.clone(),
            });
        }
        let block = staged.block;
        let number = block.block_number;
        if staged.replaces_tip {
            let last = self.blocks.len() - 1;
            self.blocks[last] = block;
        } else {
            self.blocks.push(block);
        }
        let bi = self.blocks.len() - 1;
        let tip = &self.blocks[bi];
        if let Some(tx) = tip.transactions.last() {
            self.tx_locations
                .insert(tx.id.clone(), (bi, tip.transactions.len() - 1));
        }
        metrics::counter!("vledger_blocks_sealed_total").increment(1);
        tracing::debug!(
            block = number,
            transactions = tip.transactions.len(),
            attempts = staged.attempts,
            hash = %tip.block_hash,
            "block sealed"
        );
        Ok(tip)
    }

    /// Stage and apply in one step.
    pub fn append(&mut self, tx: Transaction) -> Result<&Block, ChainError> {
        let staged = self.stage(tx)?;
        self.apply(staged)
    }

    /// Rewrite `blocks.json` and `transactions.json`. No-op in memory.
    pub fn persist(&self) -> Result<(), ChainError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let transactions: Vec<&Transaction> = self
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .collect();
        write_atomic(&dir.join(BLOCKS_FILE), &serde_json::to_vec_pretty(&self.blocks)?)?;
        write_atomic(
            &dir.join(TRANSACTIONS_FILE),
            &serde_json::to_vec_pretty(&transactions)?,
        )?;
        Ok(())
    }

    /// Re-derive every hash, link, Merkle root and difficulty target.
    /// Stops at the first violation.
    pub fn verify(&self) -> IntegrityReport {
        let mut report = IntegrityReport {
            valid: true,
            blocks_checked: 0,
            transactions_checked: 0,
            failed_block: None,
            reason: None,
        };
        let genesis = match genesis_block() {
            Ok(g) => g,
            Err(e) => {
                report.valid = false;
                report.failed_block = Some(0);
                report.reason = Some(e.to_string());
                return report;
            }
        };

        for (i, block) in self.blocks.iter().enumerate() {
            let failure = if i == 0 {
                (block != &genesis).then(|| "genesis block differs from the fixed genesis".into())
            } else {
                Self::check_block(&self.blocks[i - 1], block)
            };
            report.blocks_checked += 1;
            report.transactions_checked += block.transactions.len();
            if let Some(reason) = failure {
                tracing::warn!(block = block.block_number, %reason, "chain verification failed");
                report.valid = false;
                report.failed_block = Some(block.block_number);
                report.reason = Some(reason);
                break;
            }
        }
        report
    }

    fn check_block(prev: &Block, block: &Block) -> Option<String> {
        if block.block_number != prev.block_number + 1 {
            return Some(format!(
                "block number {} does not follow {}",
                block.block_number, prev.block_number
            ));
        }
        if block.previous_hash != prev.block_hash {
            return Some("previousHash does not match prior block hash".into());
        }
        if block.transactions.is_empty() {
            return Some("non-genesis block holds no transactions".into());
        }
        if block.transactions.len() > block.capacity {
            return Some(format!(
                "block holds {} transactions, capacity is {}",
                block.transactions.len(),
                block.capacity
            ));
        }
        if block.difficulty > MAX_DIFFICULTY {
            return Some(format!("recorded difficulty {} is out of range", block.difficulty));
        }
        for tx in &block.transactions {
            match tx.compute_hash() {
                Ok(h) if h == tx.hash => {}
                Ok(_) => return Some(format!("transaction {} hash mismatch", tx.id)),
                Err(e) => return Some(format!("transaction {}: {e}", tx.id)),
            }
        }
        match block.compute_merkle_root() {
            Ok(root) if root == block.merkle_root => {}
            Ok(_) => return Some("merkle root mismatch".into()),
            Err(e) => return Some(e.to_string()),
        }
        match block.compute_hash(block.nonce) {
            Ok(h) if h == block.block_hash => {}
            Ok(_) => return Some("block hash mismatch".into()),
            Err(e) => return Some(e.to_string()),
        }
        if !meets_difficulty(&block.block_hash, block.difficulty) {
            return Some(format!(
                "block hash does not meet difficulty {}",
                block.difficulty
            ));
        }
        None
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ChainError> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp).map_err(|e| ChainError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| ChainError::io(&tmp, e))?;
        f.sync_all().map_err(|e| ChainError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| ChainError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vledger_core::Timestamp;

    fn config() -> ChainConfig {
        ChainConfig {
            difficulty: 1,
            max_attempts: 1_000_000,
            batch_size: 3,
            seal_deadline: None,
        }
    }

    fn tx(n: u32) -> Transaction {
        Transaction::new(
            TxId::generate(),
            "RegisterVehicle",
            json!({"n": n}),
            Timestamp::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_starts_at_genesis() {
        let chain = LocalChain::in_memory(config()).unwrap();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.transaction_count(), 0);
        assert!(chain.verify().valid);
    }

    #[test]
    fn test_first_transaction_opens_block_one() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        let genesis_hash = chain.latest().block_hash.clone();
        chain.append(tx(0)).unwrap();
        assert_eq!(chain.height(), 1);
        assert!(chain.block(0).unwrap().transactions.is_empty());
        assert_eq!(chain.latest().previous_hash, genesis_hash);
    }

    #[test]
    fn test_batching_closes_full_blocks() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        for i in 0..7 {
            chain.append(tx(i)).unwrap();
        }
        // 3 + 3 + 1
        assert_eq!(chain.height(), 3);
        assert_eq!(chain.block(1).unwrap().transactions.len(), 3);
        assert_eq!(chain.block(2).unwrap().transactions.len(), 3);
        assert_eq!(chain.block(3).unwrap().transactions.len(), 1);
        assert_eq!(
            chain.block(3).unwrap().previous_hash,
            chain.block(2).unwrap().block_hash
        );
        assert_eq!(chain.transaction_count(), 7);
        assert!(chain.verify().valid);
    }

    #[test]
    fn test_transaction_lookup() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        let t = tx(1);
        let id = t.id.clone();
        chain.append(t).unwrap();
        chain.append(tx(2)).unwrap();
        let (found, block) = chain.transaction(&id).unwrap();
        assert_eq!(found.id, id);
        assert_eq!(block, 1);
        assert!(chain.transaction(&TxId::new("missing")).is_none());
    }

    #[test]
    fn test_stage_failure_leaves_chain_unchanged() {
        let mut cfg = config();
        cfg.difficulty = 8;
        cfg.max_attempts = 2;
        let chain = LocalChain::in_memory(cfg).unwrap();
        assert!(matches!(
            chain.stage(tx(0)),
            Err(ChainError::Crypto(vledger_crypto::CryptoError::ProofOfWorkExhausted { .. }))
        ));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_stale_stage_rejected() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        for i in 0..3 {
            chain.append(tx(i)).unwrap();
        }
        let staged = chain.stage(tx(9)).unwrap();
        chain.append(tx(10)).unwrap();
        assert!(chain.apply(staged).is_err());
    }

    #[test]
    fn test_difficulty_validated() {
        let mut cfg = config();
        cfg.difficulty = 9;
        assert!(matches!(
            LocalChain::in_memory(cfg),
            Err(ChainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        for i in 0..5 {
            chain.append(tx(i)).unwrap();
        }
        chain.blocks[1].transactions[0].payload = json!({"n": 999});
        let report = chain.verify();
        assert!(!report.valid);
        assert_eq!(report.failed_block, Some(1));
        assert!(report.reason.unwrap().contains("hash mismatch"));
    }

    #[test]
    fn test_verify_detects_broken_link() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        for i in 0..4 {
            chain.append(tx(i)).unwrap();
        }
        chain.blocks[2].previous_hash = "f".repeat(64);
        let report = chain.verify();
        assert_eq!(report.failed_block, Some(2));
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id;
        {
            let mut chain = LocalChain::open(dir.path(), config()).unwrap();
            let t = tx(1);
            id = t.id.clone();
            chain.append(t).unwrap();
            chain.append(tx(2)).unwrap();
            chain.persist().unwrap();
        }
        let txs: Vec<serde_json::Value> =
            serde_json::from_slice(&fs::read(dir.path().join(TRANSACTIONS_FILE)).unwrap())
                .unwrap();
        assert_eq!(txs.len(), 2);

        let chain = LocalChain::open(dir.path(), config()).unwrap();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.transaction_count(), 2);
        assert!(chain.transaction(&id).is_some());
        assert!(chain.verify().valid);
    }

    #[test]
    fn test_blocks_verify_under_recorded_difficulty_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let sealed_at = ChainConfig {
            difficulty: 2,
            ..config()
        };
        {
            let mut chain = LocalChain::open(dir.path(), sealed_at).unwrap();
            for i in 0..4 {
                chain.append(tx(i)).unwrap();
            }
            chain.persist().unwrap();
            assert!(chain.verify().valid);
        }

        for difficulty in [1, 3] {
            let chain = LocalChain::open(
                dir.path(),
                ChainConfig {
                    difficulty,
                    ..config()
                },
            )
            .unwrap();
            let report = chain.verify();
            assert!(report.valid, "difficulty {difficulty}: {:?}", report.reason);
            assert_eq!(chain.block(1).unwrap().difficulty, 2);
        }

        let mut chain = LocalChain::open(
            dir.path(),
            ChainConfig {
                difficulty: 3,
                ..config()
            },
        )
        .unwrap();
        chain.append(tx(9)).unwrap();
        assert_eq!(chain.block(1).unwrap().difficulty, 2);
        assert_eq!(chain.latest().difficulty, 3);
        assert!(chain.latest().block_hash.starts_with("000"));
        assert!(chain.verify().valid);
    }

    #[test]
    fn test_closed_block_stays_closed_when_batch_size_grows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut chain = LocalChain::open(dir.path(), config()).unwrap();
            for i in 0..3 {
                chain.append(tx(i)).unwrap();
            }
            chain.persist().unwrap();
        }
        let mut chain = LocalChain::open(
            dir.path(),
            ChainConfig {
                batch_size: 10,
                ..config()
            },
        )
        .unwrap();
        assert!(chain.verify().valid);
        chain.append(tx(3)).unwrap();
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.block(1).unwrap().transactions.len(), 3);
        assert_eq!(chain.latest().capacity, 10);
        assert!(chain.verify().valid);
    }

    #[test]
    fn test_verify_detects_raised_difficulty_claim() {
        let mut chain = LocalChain::in_memory(config()).unwrap();
        chain.append(tx(0)).unwrap();
        chain.blocks[1].difficulty = 8;
        let report = chain.verify();
        assert!(!report.valid);
        assert!(report.reason.unwrap().contains("difficulty 8"));
    }

    #[test]
    fn test_open_rejects_headless_chain() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(BLOCKS_FILE), "[]").unwrap();
        assert!(matches!(
            LocalChain::open(dir.path(), config()),
            Err(ChainError::Corrupt { .. })
        ));
    }
}
