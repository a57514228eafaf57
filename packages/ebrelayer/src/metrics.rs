//! Prometheus metrics for the relay
//!
//! Exposes metrics on /metrics endpoint for Prometheus scraping.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    // Block processing metrics
    pub static ref BLOCKS_PROCESSED: CounterVec = register_counter_vec!(
        "ebrelayer_blocks_processed_total",
        "Total number of source blocks fully processed",
        &["chain"]
    ).unwrap();

    pub static ref LATEST_CHECKPOINT: GaugeVec = register_gauge_vec!(
        "ebrelayer_latest_checkpoint",
        "Last committed checkpoint height",
        &["chain"]
    ).unwrap();

    // Event metrics
    pub static ref EVENTS_OBSERVED: CounterVec = register_counter_vec!(
        "ebrelayer_events_observed_total",
        "Total number of source events observed",
        &["chain", "kind"]
    ).unwrap();

    pub static ref EVENTS_DROPPED: CounterVec = register_counter_vec!(
        "ebrelayer_events_dropped_total",
        "Events dropped as malformed, unsupported or replayed",
        &["chain", "reason"]
    ).unwrap();

    // Claim metrics
    pub static ref CLAIMS_SUBMITTED: CounterVec = register_counter_vec!(
        "ebrelayer_claims_total",
        "Claim submissions by outcome",
        &["destination", "outcome"]
    ).unwrap();

    pub static ref SUBMISSION_RETRIES: Counter = register_counter!(
        "ebrelayer_submission_retries_total",
        "Submission attempts retried after a transient failure"
    ).unwrap();

    pub static ref PENDING_CLAIMS: GaugeVec = register_gauge_vec!(
        "ebrelayer_pending_claims",
        "Claims deferred after exhausting retries",
        &["chain"]
    ).unwrap();

    // Error metrics
    pub static ref FATAL_HALTS: CounterVec = register_counter_vec!(
        "ebrelayer_fatal_halts_total",
        "Chain workers halted by a fatal condition",
        &["chain", "reason"]
    ).unwrap();

    // Health metrics
    pub static ref UP: Gauge = register_gauge!(
        "ebrelayer_up",
        "Whether the relay is up and running"
    ).unwrap();

    pub static ref LAST_SUCCESSFUL_POLL: GaugeVec = register_gauge_vec!(
        "ebrelayer_last_successful_poll_timestamp",
        "Unix timestamp of last successful poll",
        &["chain"]
    ).unwrap();
}

/// Record a block processed and its checkpoint committed
pub fn record_block_processed(chain: &str, height: u64) {
    BLOCKS_PROCESSED.with_label_values(&[chain]).inc();
    LATEST_CHECKPOINT
        .with_label_values(&[chain])
        .set(height as f64);
}

pub fn record_event_observed(chain: &str, kind: &str) {
    EVENTS_OBSERVED.with_label_values(&[chain, kind]).inc();
}

pub fn record_event_dropped(chain: &str, reason: &str) {
    EVENTS_DROPPED.with_label_values(&[chain, reason]).inc();
}

/// Record a claim submission outcome
pub fn record_claim(destination: &str, outcome: &str) {
    CLAIMS_SUBMITTED
        .with_label_values(&[destination, outcome])
        .inc();
}

pub fn set_pending_claims(chain: &str, count: usize) {
    PENDING_CLAIMS
        .with_label_values(&[chain])
        .set(count as f64);
}

pub fn record_fatal_halt(chain: &str, reason: &str) {
    FATAL_HALTS.with_label_values(&[chain, reason]).inc();
}

/// Record last successful poll
pub fn record_successful_poll(chain: &str) {
    LAST_SUCCESSFUL_POLL
        .with_label_values(&[chain])
        .set(chrono::Utc::now().timestamp() as f64);
}
