//! # vledger-core: Foundational Types for the Vehicle Ledger
//!
//! The leaf crate of the workspace. Every other `vledger-*` crate depends on
//! it; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `Vin`, `OwnerEmail`, `PlateNumber`,
//!    `TxId`: validated constructors, no bare strings crossing crate borders.
//!
//! 2. **`CanonicalBytes` newtype.** Every transaction hash and Merkle leaf
//!    flows through `CanonicalBytes::new()`, so two nodes hashing the same
//!    payload always hash the same bytes.
//!
//! 3. **Closed `Organization` enum.** Caller identities are parsed once at the
//!    boundary from their MSP identifier; authorization downstream matches
//!    exhaustively on the enum.
//!
//! 4. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision, so
//!    ordering comparisons and canonical bytes agree.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `vledger-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod organization;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, sha256_raw_hex, ContentDigest};
pub use error::{CanonicalizationError, CoreError};
pub use identity::{OwnerEmail, PlateNumber, TxId, Vin};
pub use organization::Organization;
pub use temporal::Timestamp;
