//! # Write-Ahead-Logged Key-Value Store
//!
//! All data is held in memory in four ordered maps. Durability comes from
//! appending each committed [`WriteBatch`] as one JSON line to `wal.jsonl`
//! and fsyncing before the batch is applied in memory. Every
//! `snapshot_every` batches the full state is written to `snapshot.json`
//! (temp file, fsync, rename) and the log is truncated.
//!
//! ## Concurrency
//!
//! The maps live behind a `parking_lot::RwLock`. Readers never block each
//! other; a commit holds the write lock across append, fsync and apply, so
//! readers never observe a batch that is not yet durable. The lock is never
//! held across an `.await`.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vledger_core::sha256_raw_hex;

use crate::error::StoreError;

const SNAPSHOT_FILE: &str = "snapshot.json";
const SNAPSHOT_TMP_FILE: &str = "snapshot.json.tmp";
const WAL_FILE: &str = "wal.jsonl";

// ─── Partitions & Batches ────────────────────────────────────────────

/// A named key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Vehicle records keyed by VIN.
    Vehicles,
    /// Owner profiles keyed by e-mail.
    Owners,
    /// Composite secondary-index keys.
    Index,
    /// Committed ledger transactions not yet known to be in the chain
    /// files, keyed by transaction id.
    Journal,
}

impl Partition {
    /// Every partition.
    pub const ALL: [Partition; 4] = [Self::Vehicles, Self::Owners, Self::Index, Self::Journal];

    /// Partition name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vehicles => "vehicles",
            Self::Owners => "owners",
            Self::Index => "index",
            Self::Journal => "journal",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BatchOp {
    /// Insert or overwrite.
    Put {
        partition: Partition,
        key: String,
        value: Value,
    },
    /// Remove; deleting an absent key is a no-op.
    Delete { partition: Partition, key: String },
}

/// An ordered set of operations committed atomically.
///
/// Values are serialized when staged, so a value that cannot be serialized
/// fails before anything reaches the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put.
    pub fn put<T: Serialize>(
        &mut self,
        partition: Partition,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| StoreError::Serialization {
            partition: partition.as_str(),
            key: key.clone(),
            source,
        })?;
        self.ops.push(BatchOp::Put {
            partition,
            key,
            value,
        });
        Ok(self)
    }

    /// Stage a delete.
    pub fn delete(&mut self, partition: Partition, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            partition,
            key: key.into(),
        });
        self
    }

    /// Staged operations, in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ─── On-disk formats ─────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct WalEntry {
    sequence: u64,
    checksum: String,
    ops: Vec<BatchOp>,
}

fn ops_checksum(ops: &[BatchOp]) -> Result<String, serde_json::Error> {
    Ok(sha256_raw_hex(&serde_json::to_string(ops)?))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    sequence: u64,
    #[serde(default)]
    vehicles: BTreeMap<String, Value>,
    #[serde(default)]
    owners: BTreeMap<String, Value>,
    #[serde(default)]
    index: BTreeMap<String, Value>,
    #[serde(default)]
    journal: BTreeMap<String, Value>,
}

impl Snapshot {
    fn map(&self, p: Partition) -> &BTreeMap<String, Value> {
        match p {
            Partition::Vehicles => &self.vehicles,
            Partition::Owners => &self.owners,
            Partition::Index => &self.index,
            Partition::Journal => &self.journal,
        }
    }

    fn map_mut(&mut self, p: Partition) -> &mut BTreeMap<String, Value> {
        match p {
            Partition::Vehicles => &mut self.vehicles,
            Partition::Owners => &mut self.owners,
            Partition::Index => &mut self.index,
            Partition::Journal => &mut self.journal,
        }
    }

    fn apply(&mut self, ops: &[BatchOp]) {
        for op in ops {
            match op {
                BatchOp::Put {
                    partition,
                    key,
                    value,
                } => {
                    self.map_mut(*partition).insert(key.clone(), value.clone());
                }
                BatchOp::Delete { partition, key } => {
                    self.map_mut(*partition).remove(key);
                }
            }
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────────

/// Tuning for [`KvStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Committed batches between snapshot compactions. `0` disables
    /// automatic compaction.
    pub snapshot_every: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { snapshot_every: 64 }
    }
}

#[derive(Debug)]
struct Inner {
    state: Snapshot,
    wal: Option<File>,
    batches_since_snapshot: u64,
    poisoned: bool,
}

/// Durable, atomically batched key-value store.
#[derive(Debug)]
pub struct KvStore {
    dir: Option<PathBuf>,
    options: StoreOptions,
    inner: RwLock<Inner>,
}

impl KvStore {
    /// Open (or create) a store in `dir`, replaying the log.
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let mut state = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path).map_err(|e| StoreError::io(&snapshot_path, e))?;
            serde_json::from_slice::<Snapshot>(&bytes).map_err(|e| StoreError::Corrupt {
                path: snapshot_path.clone(),
                line: 0,
                reason: e.to_string(),
            })?
        } else {
            Snapshot::default()
        };
        let snapshot_sequence = state.sequence;

        let wal_path = dir.join(WAL_FILE);
        let replayed = replay_wal(&wal_path, &mut state)?;

        let wal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| StoreError::io(&wal_path, e))?;
        if let Some(valid_len) = replayed.truncate_to {
            wal.set_len(valid_len)
                .map_err(|e| StoreError::io(&wal_path, e))?;
            wal.sync_all().map_err(|e| StoreError::io(&wal_path, e))?;
        }

        tracing::info!(
            dir = %dir.display(),
            snapshot_sequence,
            replayed = replayed.applied,
            sequence = state.sequence,
            vehicles = state.vehicles.len(),
            "store opened"
        );

        Ok(Self {
            dir: Some(dir),
            options,
            inner: RwLock::new(Inner {
                state,
                wal: Some(wal),
                batches_since_snapshot: replayed.applied,
                poisoned: false,
            }),
        })
    }

    /// A non-durable store for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            options: StoreOptions { snapshot_every: 0 },
            inner: RwLock::new(Inner {
                state: Snapshot::default(),
                wal: None,
                batches_since_snapshot: 0,
                poisoned: false,
            }),
        }
    }

    /// Data directory, if durable.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Sequence number of the last committed batch.
    pub fn sequence(&self) -> u64 {
        self.inner.read().state.sequence
    }

    /// Read and decode one value.
    pub fn get<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let guard = self.inner.read();
        match guard.state.map(partition).get(key) {
            None => Ok(None),
            Some(v) => T::deserialize(v)
                .map(Some)
                .map_err(|source| StoreError::Serialization {
                    partition: partition.as_str(),
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Whether a key is present.
    pub fn contains(&self, partition: Partition, key: &str) -> bool {
        self.inner.read().state.map(partition).contains_key(key)
    }

    /// Number of keys in a partition.
    pub fn len(&self, partition: Partition) -> usize {
        self.inner.read().state.map(partition).len()
    }

    /// Whether a partition is empty.
    pub fn is_empty(&self, partition: Partition) -> bool {
        self.len(partition) == 0
    }

    /// All keys in `partition` that start with `prefix`, in key order.
    pub fn keys_with_prefix(&self, partition: Partition, prefix: &str) -> Vec<String> {
        let guard = self.inner.read();
        guard
            .state
            .map(partition)
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Decode every value in a partition, in key order.
    pub fn values<T: DeserializeOwned>(&self, partition: Partition) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read();
        guard
            .state
            .map(partition)
            .iter()
            .map(|(k, v)| {
                T::deserialize(v).map_err(|source| StoreError::Serialization {
                    partition: partition.as_str(),
                    key: k.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Commit a batch atomically. Returns the new sequence number.
    ///
    /// The batch is appended to the log and fsynced before it is applied in
    /// memory. If the append fails, nothing is applied and the store refuses
    /// further writes until reopened.
    pub fn commit(&self, batch: WriteBatch) -> Result<u64, StoreError> {
        let mut guard = self.inner.write();
        if guard.poisoned {
            return Err(StoreError::Poisoned);
        }
        if batch.is_empty() {
            return Ok(guard.state.sequence);
        }

        let sequence = guard.state.sequence + 1;
        if let Some(dir) = &self.dir {
            let wal_path = dir.join(WAL_FILE);
            let checksum = ops_checksum(&batch.ops).map_err(|source| StoreError::Serialization {
                partition: "wal",
                key: sequence.to_string(),
                source,
            })?;
            let entry = WalEntry {
                sequence,
                checksum,
                ops: batch.ops,
            };
            let mut line =
                serde_json::to_string(&entry).map_err(|source| StoreError::Serialization {
                    partition: "wal",
                    key: sequence.to_string(),
                    source,
                })?;
            line.push('\n');

            let appended = match guard.wal.as_mut() {
                Some(wal) => wal
                    .write_all(line.as_bytes())
                    .and_then(|()| wal.sync_data()),
                None => Ok(()),
            };
            if let Err(e) = appended {
                guard.poisoned = true;
                tracing::error!(sequence, error = %e, "write-ahead log append failed");
                return Err(StoreError::io(wal_path, e));
            }
            guard.state.apply(&entry.ops);
        } else {
            guard.state.apply(&batch.ops);
        }
        guard.state.sequence = sequence;
        guard.batches_since_snapshot += 1;

        if self.options.snapshot_every > 0
            && guard.batches_since_snapshot >= self.options.snapshot_every
        {
            // The batch is already durable in the log; a failed compaction
            // only delays truncation.
            if let Err(e) = self.compact(&mut guard) {
                tracing::error!(sequence, error = %e, "snapshot compaction failed");
            }
        }
        Ok(sequence)
    }

    /// Write a snapshot now and truncate the log.
    pub fn snapshot(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        self.compact(&mut guard)
    }

    fn compact(&self, inner: &mut Inner) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let tmp = dir.join(SNAPSHOT_TMP_FILE);
        let dest = dir.join(SNAPSHOT_FILE);
        let bytes =
            serde_json::to_vec(&inner.state).map_err(|source| StoreError::Serialization {
                partition: "snapshot",
                key: inner.state.sequence.to_string(),
                source,
            })?;
        {
            let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
            f.write_all(&bytes).map_err(|e| StoreError::io(&tmp, e))?;
            f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &dest).map_err(|e| StoreError::io(&dest, e))?;

        // Entries at or below the snapshot sequence are skipped on replay,
        // so a crash before this truncation is harmless.
        if let Some(wal) = inner.wal.as_mut() {
            let wal_path = dir.join(WAL_FILE);
            wal.set_len(0).map_err(|e| StoreError::io(&wal_path, e))?;
            wal.sync_all().map_err(|e| StoreError::io(&wal_path, e))?;
        }
        inner.batches_since_snapshot = 0;
        tracing::debug!(sequence = inner.state.sequence, "snapshot written");
        Ok(())
    }
}

struct Replay {
    applied: u64,
    truncate_to: Option<u64>,
}

fn replay_wal(path: &Path, state: &mut Snapshot) -> Result<Replay, StoreError> {
    let mut replay = Replay {
        applied: 0,
        truncate_to: None,
    };
    if !path.exists() {
        return Ok(replay);
    }
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut offset: u64 = 0;
    for (i, raw) in lines.iter().enumerate() {
        let line_no = i + 1;
        let is_last = i + 1 == lines.len();
        let line = raw.trim_end();
        if line.is_empty() {
            offset += raw.len() as u64;
            continue;
        }

        let decoded = serde_json::from_str::<WalEntry>(line)
            .map_err(|e| e.to_string())
            .and_then(|entry| {
                let expected = ops_checksum(&entry.ops).map_err(|e| e.to_string())?;
                if expected == entry.checksum && raw.ends_with('\n') {
                    Ok(entry)
                } else if expected != entry.checksum {
                    Err("checksum mismatch".to_string())
                } else {
                    Err("missing line terminator".to_string())
                }
            });

        let entry = match decoded {
            Ok(entry) => entry,
            Err(reason) if is_last => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no,
                    %reason,
                    "discarding torn write-ahead log tail"
                );
                replay.truncate_to = Some(offset);
                break;
            }
            Err(reason) => {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason,
                })
            }
        };
        offset += raw.len() as u64;

        if entry.sequence <= state.sequence {
            continue;
        }
        if entry.sequence != state.sequence + 1 {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!(
                    "sequence gap: expected {}, found {}",
                    state.sequence + 1,
                    entry.sequence
                ),
            });
        }
        state.apply(&entry.ops);
        state.sequence = entry.sequence;
        replay.applied += 1;
    }
    Ok(replay)
}
