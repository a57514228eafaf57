//! Checkpoint and replay guard
//!
//! Each source chain keeps one checkpoint: the last block whose events were
//! all processed, and the last lock nonce seen in it. A worker resumes at
//! `height + 1`; re-delivered claims are absorbed by the submitter's
//! idempotency check and the destination's at-most-once execution.
//!
//! Claims deferred after exhausting retries are persisted beside the
//! checkpoint so a restart does not lose them.

use alloy::primitives::U256;
use async_trait::async_trait;
use bridge_types::{ProphecyClaimEvent, ProphecyId};
use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryCheckpointStore;
pub use postgres::PgCheckpointStore;

/// Resume point of one source chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: u64,
    pub last_nonce: Option<U256>,
}

/// A claim whose submission was deferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClaim {
    pub claim: ProphecyClaimEvent,
    pub attempts: u32,
    pub last_error: String,
    pub deferred_at: DateTime<Utc>,
}

impl PendingClaim {
    pub fn new(claim: ProphecyClaimEvent, last_error: impl Into<String>) -> Self {
        Self {
            claim,
            attempts: 1,
            last_error: last_error.into(),
            deferred_at: Utc::now(),
        }
    }
}

/// Durable storage for checkpoints and deferred claims
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, chain: &str) -> Result<Option<Checkpoint>>;

    /// Persist the checkpoint. Only called once every event of
    /// `checkpoint.height` has finished processing.
    async fn commit(&self, chain: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Insert or replace the pending entry for the claim's prophecy id
    async fn save_pending(&self, chain: &str, pending: &PendingClaim) -> Result<()>;

    async fn remove_pending(&self, chain: &str, prophecy_id: &ProphecyId) -> Result<()>;

    async fn load_pending(&self, chain: &str) -> Result<Vec<PendingClaim>>;
}

/// Result of checking a source nonce against the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// The next nonce in sequence; process the event
    Next,
    /// Already processed before the last checkpoint; skip
    Replayed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Ordering invariant violated; requires manual resync
    #[error("nonce gap on {chain}: expected {expected}, got {got}")]
    NonceGap {
        chain: String,
        expected: U256,
        got: U256,
    },
}

/// Per-chain nonce sequencing
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    chain: String,
    last_nonce: Option<U256>,
}

impl ReplayGuard {
    pub fn new(chain: impl Into<String>, last_nonce: Option<U256>) -> Self {
        Self {
            chain: chain.into(),
            last_nonce,
        }
    }

    pub fn last_nonce(&self) -> Option<U256> {
        self.last_nonce
    }

    /// Check `nonce` against the stream and record it when it is next.
    ///
    /// Without a prior nonce (fresh start) the first observed nonce is
    /// accepted as the start of the stream.
    pub fn observe_nonce(&mut self, nonce: U256) -> Result<NonceCheck, GuardError> {
        let Some(last) = self.last_nonce else {
            self.last_nonce = Some(nonce);
            return Ok(NonceCheck::Next);
        };

        if nonce <= last {
            return Ok(NonceCheck::Replayed);
        }

        let expected = last + U256::from(1u8);
        if nonce != expected {
            return Err(GuardError::NonceGap {
                chain: self.chain.clone(),
                expected,
                got: nonce,
            });
        }

        self.last_nonce = Some(nonce);
        Ok(NonceCheck::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_fresh_guard_accepts_first_nonce() {
        let mut guard = ReplayGuard::new("ethereum", None);
        assert_eq!(guard.observe_nonce(n(7)), Ok(NonceCheck::Next));
        assert_eq!(guard.last_nonce(), Some(n(7)));
    }

    #[test]
    fn test_sequential_nonces() {
        let mut guard = ReplayGuard::new("ethereum", Some(n(7)));
        assert_eq!(guard.observe_nonce(n(8)), Ok(NonceCheck::Next));
        assert_eq!(guard.observe_nonce(n(9)), Ok(NonceCheck::Next));
        assert_eq!(guard.last_nonce(), Some(n(9)));
    }

    #[test]
    fn test_replayed_nonce_skipped() {
        let mut guard = ReplayGuard::new("ethereum", Some(n(7)));
        assert_eq!(guard.observe_nonce(n(7)), Ok(NonceCheck::Replayed));
        assert_eq!(guard.observe_nonce(n(3)), Ok(NonceCheck::Replayed));
        assert_eq!(guard.last_nonce(), Some(n(7)));
    }

    #[test]
    fn test_gap_is_an_error_and_does_not_advance() {
        let mut guard = ReplayGuard::new("ethereum", Some(n(7)));
        let err = guard.observe_nonce(n(9)).unwrap_err();
        assert_eq!(
            err,
            GuardError::NonceGap {
                chain: "ethereum".into(),
                expected: n(8),
                got: n(9),
            }
        );
        assert_eq!(guard.last_nonce(), Some(n(7)));
    }
}
