//! Chain workers
//!
//! One sequential worker per source chain: fetch finalized blocks, normalize
//! each event, build and submit the claim, then commit the block's
//! checkpoint. Workers share nothing but the destination submitters, so a
//! fatal condition on one chain halts only that chain.

use alloy::primitives::U256;
use async_trait::async_trait;
use bridge_types::{
    build_claim, normalize, DestinationChain, NormalizedEvent, ProphecyClaimEvent, ProphecyId,
    RawEvent,
};
use eyre::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub mod cosmos;
pub mod ethereum;

pub use cosmos::CosmosSource;
pub use ethereum::EthereumSource;

use crate::api::StatusBoard;
use crate::checkpoint::{Checkpoint, CheckpointStore, GuardError, NonceCheck, PendingClaim, ReplayGuard};
use crate::metrics;
use crate::submitter::{AttestationSubmitter, SubmitError, SubmitOutcome};

/// Decoded events of one source block, in log order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEvents {
    pub height: u64,
    pub events: Vec<RawEvent>,
}

/// A source chain as seen by its worker
#[async_trait]
pub trait ChainSource: Send + Sync {
    fn name(&self) -> &str;

    /// Highest height considered final
    async fn latest_height(&self) -> Result<u64>;

    /// One entry per height in `from..=to`, ascending, including empty
    /// blocks. Payloads that cannot be decoded are dropped and logged here.
    async fn fetch_blocks(&self, from: u64, to: u64) -> Result<Vec<BlockEvents>>;

    /// Largest span requested in one `fetch_blocks` call
    fn max_range(&self) -> u64 {
        100
    }
}

/// Conditions that stop a chain's worker until an operator intervenes
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    NonceGap(#[from] GuardError),

    #[error(transparent)]
    Equivocation(SubmitError),

    #[error("checkpoint store failure: {0:#}")]
    Checkpoint(eyre::Report),
}

impl WorkerError {
    pub fn reason(&self) -> &'static str {
        match self {
            WorkerError::NonceGap(_) => "nonce_gap",
            WorkerError::Equivocation(_) => "equivocation",
            WorkerError::Checkpoint(_) => "checkpoint",
        }
    }
}

/// Timing and resume settings for a worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// First height processed when the store has no checkpoint
    pub start_height: u64,
    pub poll_interval: Duration,
    pub pending_retry_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            start_height: 1,
            poll_interval: Duration::from_secs(1),
            pending_retry_interval: Duration::from_secs(60),
        }
    }
}

/// Sequential relay loop for one source chain
pub struct ChainWorker {
    source: Arc<dyn ChainSource>,
    store: Arc<dyn CheckpointStore>,
    submitters: HashMap<DestinationChain, Arc<AttestationSubmitter>>,
    settings: WorkerSettings,
    status: StatusBoard,
    pending: BTreeMap<ProphecyId, PendingClaim>,
}

impl ChainWorker {
    pub fn new(
        source: Arc<dyn ChainSource>,
        store: Arc<dyn CheckpointStore>,
        settings: WorkerSettings,
        status: StatusBoard,
    ) -> Self {
        Self {
            source,
            store,
            submitters: HashMap::new(),
            settings,
            status,
            pending: BTreeMap::new(),
        }
    }

    /// Route claims for the submitter's chain through it
    pub fn with_submitter(mut self, submitter: Arc<AttestationSubmitter>) -> Self {
        self.submitters.insert(submitter.chain(), submitter);
        self
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Run until shutdown (`Ok`) or a fatal condition (`Err`).
    ///
    /// Shutdown is honoured between blocks only, so a block is either fully
    /// processed and checkpointed or not started.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        let chain = self.source.name().to_string();

        let checkpoint = self
            .store
            .load(&chain)
            .await
            .map_err(WorkerError::Checkpoint)?;
        let (mut next_height, last_nonce) = match checkpoint {
            Some(c) => (c.height + 1, c.last_nonce),
            None => (self.settings.start_height, None),
        };
        let mut guard = ReplayGuard::new(chain.clone(), last_nonce);

        self.pending = self
            .store
            .load_pending(&chain)
            .await
            .map_err(WorkerError::Checkpoint)?
            .into_iter()
            .map(|p| (p.claim.prophecy_id, p))
            .collect();
        metrics::set_pending_claims(&chain, self.pending.len());

        info!(
            chain = %chain,
            next_height,
            last_nonce = ?last_nonce,
            pending = self.pending.len(),
            "Chain worker started"
        );

        let mut last_pending_pass = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_pending_pass.elapsed() >= self.settings.pending_retry_interval {
                self.retry_pending().await?;
                last_pending_pass = Instant::now();
            }

            let latest = match self.source.latest_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!(chain = %chain, error = %e, "Failed to get latest height");
                    sleep_or_shutdown(self.settings.poll_interval, &mut shutdown).await;
                    continue;
                }
            };

            if latest < next_height {
                sleep_or_shutdown(self.settings.poll_interval, &mut shutdown).await;
                continue;
            }

            let to = latest.min(next_height + self.source.max_range().max(1) - 1);
            let blocks = match self.source.fetch_blocks(next_height, to).await {
                Ok(blocks) => blocks,
                Err(e) => {
                    warn!(chain = %chain, from = next_height, to, error = %e, "Failed to fetch blocks");
                    sleep_or_shutdown(self.settings.poll_interval, &mut shutdown).await;
                    continue;
                }
            };

            debug!(chain = %chain, from = next_height, to, blocks = blocks.len(), "Processing blocks");

            for block in blocks {
                if *shutdown.borrow() {
                    break;
                }
                if block.height != next_height {
                    warn!(
                        chain = %chain,
                        expected = next_height,
                        got = block.height,
                        "Source returned out-of-order block; refetching"
                    );
                    break;
                }

                self.process_block(&block, &mut guard).await?;

                let checkpoint = Checkpoint {
                    height: block.height,
                    last_nonce: guard.last_nonce(),
                };
                self.store
                    .commit(&chain, &checkpoint)
                    .await
                    .map_err(WorkerError::Checkpoint)?;
                metrics::record_block_processed(&chain, block.height);
                self.publish_status(checkpoint).await;
                next_height = block.height + 1;
            }

            metrics::record_successful_poll(&chain);
        }

        info!(chain = %chain, next_height, "Chain worker stopped");
        Ok(())
    }

    /// Relay every event of one block
    pub async fn process_block(
        &mut self,
        block: &BlockEvents,
        guard: &mut ReplayGuard,
    ) -> Result<(), WorkerError> {
        let chain = self.source.name().to_string();

        for raw in &block.events {
            metrics::record_event_observed(&chain, raw.kind.as_str());

            // A malformed lock is dropped below but still consumes its nonce
            if let Some(nonce) = raw.nonce() {
                if guard.observe_nonce(nonce)? == NonceCheck::Replayed {
                    debug!(chain = %chain, nonce = %nonce, "Skipping replayed event");
                    metrics::record_event_dropped(&chain, "replayed");
                    continue;
                }
            }

            let event = match normalize(raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(chain = %chain, height = block.height, error = %e, "Dropping event");
                    metrics::record_event_dropped(&chain, "unsupported");
                    continue;
                }
            };

            self.relay_event(&event, block.height).await?;
        }

        Ok(())
    }

    async fn relay_event(&mut self, event: &NormalizedEvent, height: u64) -> Result<(), WorkerError> {
        let chain = self.source.name().to_string();

        if let NormalizedEvent::ProphecyClaim(claim) = event {
            info!(
                chain = %chain,
                height,
                prophecy_id = %claim.prophecy_id,
                validator = %claim.validator,
                kind = %claim.kind,
                amount = %claim.amount,
                "Observed prophecy claim"
            );
            return Ok(());
        }

        let Some(route) = event.kind().route() else {
            warn!(chain = %chain, kind = %event.kind(), "Event kind has no destination");
            metrics::record_event_dropped(&chain, "unsupported_claim_kind");
            return Ok(());
        };

        let Some(submitter) = self.submitters.get(&route.destination).cloned() else {
            warn!(
                chain = %chain,
                destination = %route.destination,
                "No submitter configured for destination"
            );
            metrics::record_event_dropped(&chain, "no_destination");
            return Ok(());
        };

        let claim = match build_claim(event, &submitter.validator()) {
            Ok(claim) => claim,
            Err(e) => {
                warn!(chain = %chain, height, error = %e, "Dropping event");
                metrics::record_event_dropped(&chain, "unsupported_claim_kind");
                return Ok(());
            }
        };

        debug!(
            chain = %chain,
            height,
            prophecy_id = %claim.prophecy_id,
            destination = %route.destination,
            "Built claim"
        );

        self.submit_claim(&submitter, claim).await
    }

    async fn submit_claim(
        &mut self,
        submitter: &AttestationSubmitter,
        claim: ProphecyClaimEvent,
    ) -> Result<(), WorkerError> {
        let chain = self.source.name().to_string();
        let prophecy_id = claim.prophecy_id;

        match submitter.submit(&claim).await {
            Ok(SubmitOutcome::Submitted { .. }) | Ok(SubmitOutcome::AlreadySubmitted) => {
                if self.pending.remove(&prophecy_id).is_some() {
                    if let Err(e) = self.store.remove_pending(&chain, &prophecy_id).await {
                        warn!(chain = %chain, prophecy_id = %prophecy_id, error = %e, "Failed to clear pending claim");
                    }
                }
            }
            Ok(SubmitOutcome::Deferred { reason }) => {
                let entry = match self.pending.remove(&prophecy_id) {
                    Some(mut existing) => {
                        existing.attempts += 1;
                        existing.last_error = reason.clone();
                        existing
                    }
                    None => PendingClaim::new(claim, reason.clone()),
                };
                warn!(
                    alert = true,
                    chain = %chain,
                    prophecy_id = %prophecy_id,
                    attempts = entry.attempts,
                    reason = %reason,
                    "Claim left pending for a later retry pass"
                );
                // The block must not checkpoint past a claim that is not durable
                if let Err(e) = self.store.save_pending(&chain, &entry).await {
                    error!(chain = %chain, prophecy_id = %prophecy_id, error = %e, "Failed to persist pending claim");
                    return Err(WorkerError::Checkpoint(e));
                }
                self.pending.insert(prophecy_id, entry);
            }
            Err(e) if e.is_fatal() => {
                error!(chain = %chain, prophecy_id = %prophecy_id, error = %e, "Fatal submission error");
                return Err(WorkerError::Equivocation(e));
            }
            Err(e) => {
                warn!(chain = %chain, prophecy_id = %prophecy_id, error = %e, "Claim rejected");
                metrics::record_event_dropped(&chain, "rejected");
            }
        }

        metrics::set_pending_claims(&chain, self.pending.len());
        Ok(())
    }

    /// Re-attempt every deferred claim once
    pub async fn retry_pending(&mut self) -> Result<(), WorkerError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        info!(chain = %self.source.name(), pending = self.pending.len(), "Retrying pending claims");

        let claims: Vec<ProphecyClaimEvent> =
            self.pending.values().map(|p| p.claim.clone()).collect();
        for claim in claims {
            let submitter = claim
                .kind
                .route()
                .and_then(|route| self.submitters.get(&route.destination).cloned());
            match submitter {
                Some(submitter) => self.submit_claim(&submitter, claim).await?,
                None => warn!(prophecy_id = %claim.prophecy_id, "No submitter for pending claim"),
            }
        }
        Ok(())
    }

    async fn publish_status(&self, checkpoint: Checkpoint) {
        let mut board = self.status.write().await;
        let entry = board.entry(self.source.name().to_string()).or_default();
        entry.height = checkpoint.height;
        entry.last_nonce = checkpoint.last_nonce.map(|n: U256| n.to_string());
        entry.pending_claims = self.pending.len();
    }
}

async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}

/// Runs every chain worker and reports the ones that halt
pub struct WorkerManager {
    workers: Vec<ChainWorker>,
    status: StatusBoard,
}

impl WorkerManager {
    pub fn new(workers: Vec<ChainWorker>, status: StatusBoard) -> Self {
        Self { workers, status }
    }

    /// Run all workers concurrently until each has stopped or halted.
    /// A halted chain is logged and left stopped; the others keep running.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut join_set = tokio::task::JoinSet::new();

        for worker in self.workers {
            let name = worker.name().to_string();
            let shutdown = shutdown.clone();
            join_set.spawn(async move { (name, worker.run(shutdown).await) });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((chain, Ok(()))) => {
                    info!(chain = %chain, "Chain worker exited");
                }
                Ok((chain, Err(e))) => {
                    error!(
                        chain = %chain,
                        reason = e.reason(),
                        error = %e,
                        "Chain worker halted; manual intervention required"
                    );
                    metrics::record_fatal_halt(&chain, e.reason());
                    self.status
                        .write()
                        .await
                        .entry(chain)
                        .or_default()
                        .halted = Some(e.to_string());
                }
                Err(e) => {
                    error!("A chain worker task panicked: {:?}", e);
                }
            }
        }

        Ok(())
    }
}
