//! # vledger-store: Ledger Persistence
//!
//! Two layers:
//!
//! - **[`KvStore`]** (`kv.rs`): string-keyed JSON values in four
//!   partitions (`vehicles`, `owners`, `index`, `journal`), held fully in
//!   memory and made durable with a write-ahead log plus periodic snapshot. A
//!   [`WriteBatch`] commits all-or-nothing: either its WAL line is fsynced
//!   and every operation is applied, or nothing is.
//!
//! - **Index maintainer** (`index.rs`): composite keys for the
//!   `owner~vin` and `plate~vin` secondary indices, and helpers that stage
//!   the delete-old / put-new pair into the same batch as the record write.
//!
//! ## On-disk layout
//!
//! ```text
//! <data_dir>/snapshot.json   {"sequence": n, "vehicles": {..}, "owners": {..}, "index": {..}, "journal": {..}}
//! <data_dir>/wal.jsonl       one committed batch per line, sequence > snapshot sequence
//! ```
//!
//! On open, the snapshot is loaded and every WAL batch after it is replayed.
//! A final line that fails to parse is a torn write from a crash during
//! append and is discarded; a bad line anywhere else is corruption.

pub mod error;
pub mod index;
pub mod kv;

pub use error::StoreError;
pub use index::{
    owner_index_key, parse_composite_key, plate_index_key, stage_owner_change,
    stage_plate_change, vin_by_plate, vins_by_owner, CompositeKey, OWNER_INDEX, PLATE_INDEX,
};
pub use kv::{BatchOp, KvStore, Partition, StoreOptions, WriteBatch};
