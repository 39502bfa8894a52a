//! # vledger-chain: Local Chain Emulator
//!
//! Stands in for a real ledger network's ordering service when none is
//! reachable. Every committed state-machine call becomes a [`Transaction`];
//! transactions are packed into [`Block`]s of at most `batch_size`, each
//! block hash-linked to its predecessor, summarized by a Merkle root, and
//! sealed with a bounded proof-of-work search.
//!
//! ## Block lifecycle
//!
//! Block 0 is a fixed genesis block and never holds transactions. The tip
//! block stays *open* until it holds `batch_size` transactions: each append
//! re-derives its Merkle root and re-seals it. Once full, it is closed and
//! the next transaction opens a new block linked to it.
//!
//! Appending is split into [`LocalChain::stage`] (pure: computes the new tip
//! including the nonce search) and [`LocalChain::apply`] (infallible
//! in-memory swap), so a caller can abort on a proof-of-work failure before
//! anything else is committed.
//!
//! ## Persistence
//!
//! `blocks.json` and `transactions.json` are JSON arrays rewritten whole
//! (temp file, fsync, rename) by [`LocalChain::persist`].

pub mod block;
pub mod chain;
pub mod error;
pub mod transaction;

pub use block::{genesis_block, Block, ZERO_HASH};
pub use chain::{ChainConfig, ChainStats, IntegrityReport, LocalChain, StagedAppend};
pub use error::ChainError;
pub use transaction::Transaction;
