//! # Blocks
//!
//! Block hash preimage, in this exact order with no separators:
//!
//! ```text
//! blockNumber ‖ timestamp ‖ previousHash ‖ json(transactions) ‖ nonce
//! ```
//!
//! `timestamp` is the `YYYY-MM-DDTHH:MM:SSZ` rendering and
//! `json(transactions)` is the compact serde_json serialization of the
//! transaction array.
//!
//! Each block also records the `difficulty` it was sealed under and its
//! `capacity` (the batch size in force when it was opened). Verification
//! checks a block against its own header, so changing the emulator
//! parameters never invalidates blocks sealed earlier.

use serde::{Deserialize, Serialize};
use vledger_core::{sha256_raw_hex, Timestamp};
use vledger_crypto::{merkle_root, CryptoError, PowSolution, ProofOfWork, EMPTY_MERKLE_ROOT};

use crate::error::ChainError;
use crate::transaction::Transaction;

/// `previousHash` of the genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One block of the local chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_number: u64,
    pub block_hash: String,
    pub previous_hash: String,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub merkle_root: String,
    /// Leading zero hex digits this block was sealed under.
    #[serde(default)]
    pub difficulty: u32,
    /// Most transactions this block may hold. Zero for genesis.
    #[serde(default)]
    pub capacity: usize,
}

/// The fixed genesis block: number 0, zero previous hash, Unix-epoch
/// timestamp, no transactions, nonce 0. It is not proof-of-work sealed.
pub fn genesis_block() -> Result<Block, ChainError> {
    let mut block = Block {
        block_number: 0,
        block_hash: String::new(),
        previous_hash: ZERO_HASH.to_string(),
        timestamp: Timestamp::epoch(),
        transactions: Vec::new(),
        nonce: 0,
        merkle_root: EMPTY_MERKLE_ROOT.to_string(),
        difficulty: 0,
        capacity: 0,
    };
    block.block_hash = block.compute_hash(0)?;
    Ok(block)
}

impl Block {
    /// An unsealed, empty block following `previous` that holds at most
    /// `capacity` transactions.
    pub fn open_after(previous: &Block, timestamp: Timestamp, capacity: usize) -> Self {
        Self {
            block_number: previous.block_number + 1,
            block_hash: String::new(),
            previous_hash: previous.block_hash.clone(),
            timestamp,
            transactions: Vec::new(),
            nonce: 0,
            merkle_root: EMPTY_MERKLE_ROOT.to_string(),
            difficulty: 0,
            capacity,
        }
    }

    /// Whether another transaction fits.
    pub fn has_room(&self) -> bool {
        !self.is_genesis() && self.transactions.len() < self.capacity
    }

    /// Whether this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.block_number == 0
    }

    /// Hash of this block's contents with the given nonce.
    pub fn compute_hash(&self, nonce: u64) -> Result<String, ChainError> {
        let txs = serde_json::to_string(&self.transactions)?;
        Ok(sha256_raw_hex(&format!(
            "{}{}{}{}{}",
            self.block_number,
            self.timestamp.to_iso8601(),
            self.previous_hash,
            txs,
            nonce
        )))
    }

    /// Merkle root over the transaction hashes.
    pub fn compute_merkle_root(&self) -> Result<String, CryptoError> {
        let hashes: Vec<&str> = self.transactions.iter().map(|t| t.hash.as_str()).collect();
        merkle_root(&hashes)
    }

    /// Recompute the Merkle root and search for a nonce meeting `pow`.
    ///
    /// On failure the block is left unchanged.
    pub fn seal(&mut self, pow: &ProofOfWork) -> Result<PowSolution, ChainError> {
        let merkle = self.compute_merkle_root()?;
        // Serialize once; only the nonce suffix varies across attempts.
        let prefix = format!(
            "{}{}{}{}",
            self.block_number,
            self.timestamp.to_iso8601(),
            self.previous_hash,
            serde_json::to_string(&self.transactions)?
        );
        let solution = pow.search(|nonce| sha256_raw_hex(&format!("{prefix}{nonce}")))?;
        self.merkle_root = merkle;
        self.difficulty = pow.difficulty;
        self.nonce = solution.nonce;
        self.block_hash = solution.hash.clone();
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vledger_core::TxId;
    use vledger_crypto::meets_difficulty;

    fn tx(id: &str) -> Transaction {
        Transaction::new(
            TxId::new(id),
            "RegisterVehicle",
            json!({"vin": id}),
            Timestamp::parse("2026-03-01T10:00:00Z").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_genesis_is_fixed() {
        let a = genesis_block().unwrap();
        let b = genesis_block().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.block_number, 0);
        assert_eq!(a.previous_hash, ZERO_HASH);
        assert_eq!(a.merkle_root, "0");
        assert!(a.transactions.is_empty());
    }

    #[test]
    fn test_seal_meets_difficulty_and_matches_recompute() {
        let genesis = genesis_block().unwrap();
        let mut block = Block::open_after(&genesis, Timestamp::now(), 10);
        block.transactions.push(tx("a"));
        block.transactions.push(tx("b"));
        block.transactions.push(tx("c"));
        let pow = ProofOfWork::new(2, 1_000_000).unwrap();
        let sol = block.seal(&pow).unwrap();

        assert!(meets_difficulty(&block.block_hash, 2));
        assert_eq!(block.difficulty, 2);
        assert_eq!(block.capacity, 10);
        assert_eq!(block.compute_hash(block.nonce).unwrap(), block.block_hash);
        assert_eq!(sol.nonce, block.nonce);
        assert_eq!(block.previous_hash, genesis.block_hash);
        assert_eq!(block.merkle_root.len(), 64);
    }

    #[test]
    fn test_seal_failure_leaves_block_unchanged() {
        let genesis = genesis_block().unwrap();
        let mut block = Block::open_after(&genesis, Timestamp::now(), 10);
        block.transactions.push(tx("a"));
        let before = block.clone();
        let pow = ProofOfWork::new(8, 3).unwrap();
        assert!(block.seal(&pow).is_err());
        assert_eq!(block, before);
    }
}
