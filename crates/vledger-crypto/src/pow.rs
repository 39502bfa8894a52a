//! # Bounded Proof-of-Work
//!
//! Local stand-in for a real network's ordering guarantee. The search
//! increments a nonce from 0 until the caller-supplied hash function yields a
//! hash with `difficulty` leading `'0'` hex digits.
//!
//! The search never runs unbounded: it stops after `max_attempts` nonces or
//! once `deadline` elapses, whichever comes first, and reports
//! [`CryptoError::ProofOfWorkExhausted`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Highest difficulty accepted. Eight hex zeros is ~4.3e9 expected attempts,
/// far past anything a local emulator should attempt.
pub const MAX_DIFFICULTY: u32 = 8;

/// How often (in attempts) the wall-clock deadline is checked.
const DEADLINE_CHECK_INTERVAL: u64 = 4096;

/// Proof-of-work parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    /// Required leading zero hex digits.
    pub difficulty: u32,
    /// Maximum nonces to try.
    pub max_attempts: u64,
    /// Optional wall-clock budget.
    #[serde(default)]
    pub deadline: Option<Duration>,
}

/// A nonce that satisfies the difficulty target, with the hash it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowSolution {
    /// Winning nonce.
    pub nonce: u64,
    /// Hash produced by the winning nonce.
    pub hash: String,
    /// Nonces tried, including the winner.
    pub attempts: u64,
}

impl ProofOfWork {
    /// Build validated parameters.
    pub fn new(difficulty: u32, max_attempts: u64) -> Result<Self, CryptoError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(CryptoError::DifficultyOutOfRange(difficulty));
        }
        Ok(Self {
            difficulty,
            max_attempts,
            deadline: None,
        })
    }

    /// Attach a wall-clock budget.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Search for a nonce whose hash meets the target.
    ///
    /// `hash_with_nonce` must be a pure function of the nonce.
    pub fn search(
        &self,
        mut hash_with_nonce: impl FnMut(u64) -> String,
    ) -> Result<PowSolution, CryptoError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(CryptoError::DifficultyOutOfRange(self.difficulty));
        }
        let started = Instant::now();
        let mut attempts: u64 = 0;

        while attempts < self.max_attempts {
            let nonce = attempts;
            let hash = hash_with_nonce(nonce);
            attempts += 1;
            if meets_difficulty(&hash, self.difficulty) {
                return Ok(PowSolution {
                    nonce,
                    hash,
                    attempts,
                });
            }
            if attempts % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = self.deadline {
                    if started.elapsed() >= deadline {
                        break;
                    }
                }
            }
        }

        tracing::error!(
            attempts,
            difficulty = self.difficulty,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "proof-of-work search exhausted"
        );
        Err(CryptoError::ProofOfWorkExhausted {
            attempts,
            difficulty: self.difficulty,
        })
    }
}

/// Whether `hash` starts with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let d = difficulty as usize;
    hash.len() >= d && hash.bytes().take(d).all(|b| b == b'0')
}
