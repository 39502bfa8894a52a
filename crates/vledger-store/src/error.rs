//! # Store Errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the persistence layer.
///
/// A failed commit never leaves the in-memory view ahead of the log.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted file could not be decoded.
    #[error("corrupt store file {path} (line {line}): {reason}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number, 0 for whole-file formats.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// A value could not be serialized for writing, or a stored value could
    /// not be decoded into the requested type.
    #[error("serialization error for {partition}/{key}: {source}")]
    Serialization {
        /// Partition name.
        partition: &'static str,
        /// Key within the partition.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A write was attempted after an earlier log append failed.
    #[error("store is read-only after a failed log append; reopen to recover")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
