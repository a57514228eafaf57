//! Attestation submitter
//!
//! Signs a built claim under the validator's key and submits it to the
//! destination chain, at most once per prophecy id:
//!
//! 1. Serialize on the prophecy id, so concurrent submissions for the same
//!    transfer cannot both pass the pre-check.
//! 2. Ask the destination for this validator's existing claim. A matching
//!    content hash means the work is already done; a different one is
//!    equivocation and is never resolved automatically.
//! 3. Submit with bounded exponential backoff. Exhausted retries defer the
//!    claim instead of failing the worker.

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use bridge_types::{claim_route, DestinationChain, ProphecyClaimEvent, ProphecyId};
use eyre::{Result, WrapErr};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

pub mod cosmos;
pub mod ethereum;
pub mod retry;

pub use cosmos::CosmosDestination;
pub use ethereum::EthereumDestination;

use crate::metrics;
use retry::{with_retry, ErrorClass, RetryConfig};

/// A claim plus the validator's signature over its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedClaim {
    pub claim: ProphecyClaimEvent,
    pub content_hash: B256,
    /// 65-byte `r ‖ s ‖ v` secp256k1 signature
    pub signature: Vec<u8>,
}

/// Destination chain as seen by the submitter
#[async_trait]
pub trait ClaimDestination: Send + Sync {
    fn chain(&self) -> DestinationChain;

    /// Identity claims are submitted under on this chain
    fn validator(&self) -> String;

    /// Content hash of this validator's claim for `prophecy_id`, if one exists
    async fn existing_claim(&self, prophecy_id: &ProphecyId) -> Result<Option<B256>>;

    /// Send the claim; returns the transaction hash
    async fn submit(&self, claim: &SignedClaim) -> Result<String>;
}

/// Signs claim content hashes with the validator's secp256k1 key
#[derive(Clone)]
pub struct ClaimSigner {
    signer: PrivateKeySigner,
}

impl ClaimSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.parse().wrap_err("Invalid private key")?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign(&self, claim: &ProphecyClaimEvent) -> Result<SignedClaim> {
        let content_hash = claim.content_hash();
        let signature = self
            .signer
            .sign_hash_sync(&content_hash)
            .wrap_err("Failed to sign claim")?;
        Ok(SignedClaim {
            claim: claim.clone(),
            content_hash,
            signature: signature.as_bytes().to_vec(),
        })
    }
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { tx_hash: String },
    /// The destination already holds an identical claim from this validator
    AlreadySubmitted,
    /// Retries exhausted or destination unavailable; keep the claim pending
    Deferred { reason: String },
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitOutcome::Submitted { .. } => "submitted",
            SubmitOutcome::AlreadySubmitted => "already_submitted",
            SubmitOutcome::Deferred { .. } => "deferred",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// This validator already claimed different content for the prophecy
    #[error("equivocation detected for prophecy {prophecy_id}: existing {existing}, attempted {attempted}")]
    EquivocationDetected {
        prophecy_id: ProphecyId,
        existing: B256,
        attempted: B256,
    },

    #[error("claim for prophecy {prophecy_id} routes to {routed}, not {destination}")]
    WrongDestination {
        prophecy_id: ProphecyId,
        routed: DestinationChain,
        destination: DestinationChain,
    },
}

impl SubmitError {
    /// Fatal errors halt the source chain's worker
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubmitError::EquivocationDetected { .. })
    }
}

/// Keyed async locks, one per prophecy id in flight
#[derive(Default)]
pub struct ProphecyLocks {
    locks: Mutex<HashMap<ProphecyId, Arc<AsyncMutex<()>>>>,
}

impl ProphecyLocks {
    pub async fn acquire(&self, prophecy_id: ProphecyId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(prophecy_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    fn release(&self, prophecy_id: &ProphecyId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(prophecy_id) {
            // Only the map's own reference left: no holder, no waiter
            if Arc::strong_count(lock) == 1 {
                locks.remove(prophecy_id);
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Submits claims to one destination chain
pub struct AttestationSubmitter {
    destination: Arc<dyn ClaimDestination>,
    signer: ClaimSigner,
    retry: RetryConfig,
    locks: ProphecyLocks,
}

impl AttestationSubmitter {
    pub fn new(destination: Arc<dyn ClaimDestination>, signer: ClaimSigner, retry: RetryConfig) -> Self {
        Self {
            destination,
            signer,
            retry,
            locks: ProphecyLocks::default(),
        }
    }

    pub fn chain(&self) -> DestinationChain {
        self.destination.chain()
    }

    pub fn validator(&self) -> String {
        self.destination.validator()
    }

    /// Submit `claim`, idempotently.
    pub async fn submit(&self, claim: &ProphecyClaimEvent) -> Result<SubmitOutcome, SubmitError> {
        let chain = self.destination.chain();
        let prophecy_id = claim.prophecy_id;

        if let Ok(route) = claim_route(claim) {
            if route.destination != chain {
                return Err(SubmitError::WrongDestination {
                    prophecy_id,
                    routed: route.destination,
                    destination: chain,
                });
            }
        }

        let guard = self.locks.acquire(prophecy_id).await;
        let outcome = self.submit_locked(claim).await;
        drop(guard);
        self.locks.release(&prophecy_id);

        match &outcome {
            Ok(outcome) => metrics::record_claim(chain.as_str(), outcome.as_str()),
            Err(e) if e.is_fatal() => metrics::record_claim(chain.as_str(), "equivocation"),
            Err(_) => metrics::record_claim(chain.as_str(), "rejected"),
        }
        outcome
    }

    async fn submit_locked(&self, claim: &ProphecyClaimEvent) -> Result<SubmitOutcome, SubmitError> {
        let prophecy_id = claim.prophecy_id;
        let content_hash = claim.content_hash();

        if let Some(outcome) = self.check_existing(&prophecy_id, content_hash).await? {
            return Ok(outcome);
        }

        let signed = match self.signer.sign(claim) {
            Ok(signed) => signed,
            Err(e) => {
                error!(prophecy_id = %prophecy_id, error = %e, "Failed to sign claim");
                return Ok(SubmitOutcome::Deferred {
                    reason: format!("{:#}", e),
                });
            }
        };

        let destination = self.destination.clone();
        let result = with_retry(&self.retry, "submit_claim", |attempt| {
            let destination = destination.clone();
            let signed = signed.clone();
            async move {
                if attempt > 0 {
                    debug!(prophecy_id = %signed.claim.prophecy_id, attempt, "Resubmitting claim");
                }
                destination.submit(&signed).await
            }
        })
        .await;

        match result {
            Ok(tx_hash) => {
                info!(
                    prophecy_id = %prophecy_id,
                    destination = %self.destination.chain(),
                    validator = %claim.validator,
                    tx_hash = %tx_hash,
                    "Claim submitted"
                );
                Ok(SubmitOutcome::Submitted { tx_hash })
            }
            Err(failure) if failure.class == ErrorClass::AlreadyProcessed => {
                // Re-read what the destination holds to tell a duplicate from equivocation
                match self.check_existing(&prophecy_id, content_hash).await? {
                    Some(outcome) => Ok(outcome),
                    None => Ok(SubmitOutcome::Deferred {
                        reason: failure.to_string(),
                    }),
                }
            }
            Err(failure) => {
                warn!(
                    prophecy_id = %prophecy_id,
                    destination = %self.destination.chain(),
                    error = %failure,
                    "Claim submission deferred"
                );
                Ok(SubmitOutcome::Deferred {
                    reason: failure.to_string(),
                })
            }
        }
    }

    /// `Some` when the destination already decides the outcome
    async fn check_existing(
        &self,
        prophecy_id: &ProphecyId,
        content_hash: B256,
    ) -> Result<Option<SubmitOutcome>, SubmitError> {
        let destination = self.destination.clone();
        let id = *prophecy_id;
        let existing = with_retry(&self.retry, "existing_claim", |_| {
            let destination = destination.clone();
            async move { destination.existing_claim(&id).await }
        })
        .await;

        match existing {
            Ok(Some(existing)) if existing == content_hash => {
                debug!(prophecy_id = %prophecy_id, "Claim already on destination");
                Ok(Some(SubmitOutcome::AlreadySubmitted))
            }
            Ok(Some(existing)) => {
                error!(
                    prophecy_id = %prophecy_id,
                    existing = %existing,
                    attempted = %content_hash,
                    "Equivocation: validator already claimed different content"
                );
                Err(SubmitError::EquivocationDetected {
                    prophecy_id: *prophecy_id,
                    existing,
                    attempted: content_hash,
                })
            }
            Ok(None) => Ok(None),
            Err(failure) => {
                warn!(prophecy_id = %prophecy_id, error = %failure, "Pre-submission check failed");
                Ok(Some(SubmitOutcome::Deferred {
                    reason: format!("existing claim check: {}", failure),
                }))
            }
        }
    }
}
