//! # Merkle Root
//!
//! Summarizes a block's transaction hashes in a single hash.
//!
//! ## Algorithm
//!
//! ```text
//! level = tx_hashes
//! while len(level) > 1:
//!     if len(level) is odd: level.push(level.last)
//!     level = [SHA256(level[i] || level[i+1]) for i in 0, 2, 4, ...]
//! root = level[0]            (or "0" when there are no transactions)
//! ```
//!
//! The pair preimage is the concatenation of the two lowercase hex strings,
//! so a root computed here can be recomputed by any client holding the
//! hex transaction hashes without agreeing on a binary encoding.

use vledger_core::sha256_raw_hex;

use crate::error::CryptoError;

/// Root of a block with no transactions.
pub const EMPTY_MERKLE_ROOT: &str = "0";

/// Compute the Merkle root of an ordered list of transaction hashes.
///
/// Every input must be 64 hex characters; anything else is a corrupted
/// transaction and is reported rather than hashed.
pub fn merkle_root<S: AsRef<str>>(tx_hashes: &[S]) -> Result<String, CryptoError> {
    if tx_hashes.is_empty() {
        return Ok(EMPTY_MERKLE_ROOT.to_string());
    }

    let mut level: Vec<String> = Vec::with_capacity(tx_hashes.len());
    for h in tx_hashes {
        let h = h.as_ref();
        if !is_hex_32(h) {
            return Err(CryptoError::MalformedHash(h.to_string()));
        }
        level.push(h.to_ascii_lowercase());
    }

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level
            .chunks_exact(2)
            .map(|pair| pair_hash(&pair[0], &pair[1]))
            .collect();
    }

    Ok(level.swap_remove(0))
}

fn pair_hash(left: &str, right: &str) -> String {
    let mut preimage = String::with_capacity(left.len() + right.len());
    preimage.push_str(left);
    preimage.push_str(right);
    sha256_raw_hex(&preimage)
}

fn is_hex_32(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
