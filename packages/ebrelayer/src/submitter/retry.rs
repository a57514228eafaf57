//! Retry utilities for claim submission
//!
//! Bounded exponential backoff plus a coarse classification of RPC and
//! contract errors, so a claim the destination already holds is not retried
//! as if the network were down.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;

/// Submission retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Check if another attempt is allowed after `attempts` failures
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }
}

/// Classifies errors for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Temporary failure - should retry (RPC timeout, network issues)
    Transient,
    /// The destination already holds this validator's claim
    AlreadyProcessed,
    /// Permanent failure - do not retry (invalid params, contract error)
    Permanent,
    /// Unknown error - may retry with backoff
    Unknown,
}

/// Classify an error for retry decisions
pub fn classify_error(error: &str) -> ErrorClass {
    let error_lower = error.to_lowercase();

    if error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("connection")
        || error_lower.contains("network")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("503")
        || error_lower.contains("502")
        || error_lower.contains("temporarily unavailable")
        || error_lower.contains("account sequence mismatch")
    {
        return ErrorClass::Transient;
    }

    if error_lower.contains("already claimed")
        || error_lower.contains("duplicate claim")
        || error_lower.contains("already known")
        || error_lower.contains("tx already exists in cache")
    {
        return ErrorClass::AlreadyProcessed;
    }

    if error_lower.contains("reverted")
        || error_lower.contains("invalid signature")
        || error_lower.contains("insufficient funds")
        || error_lower.contains("out of gas")
        || error_lower.contains("unauthorized")
        || error_lower.contains("not a validator")
        || error_lower.contains("unsupported claim")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}

/// Why [`with_retry`] gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub class: ErrorClass,
    pub attempts: u32,
    pub last_error: String,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} after {} attempt(s): {}",
            self.class, self.attempts, self.last_error
        )
    }
}

/// Execute with retry logic
///
/// `operation` receives the 0-indexed attempt number. Transient and unknown
/// errors are retried with backoff until the attempt ceiling; the other
/// classes return immediately.
pub async fn with_retry<F, T, Fut>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = eyre::Result<T>>,
{
    let mut attempts = 0;

    loop {
        match operation(attempts).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let error_str = format!("{:#}", e);
                attempts += 1;
                let class = classify_error(&error_str);

                match class {
                    ErrorClass::AlreadyProcessed | ErrorClass::Permanent => {
                        debug!(op = label, ?class, error = %error_str, "Not retrying");
                        return Err(RetryFailure {
                            class,
                            attempts,
                            last_error: error_str,
                        });
                    }
                    ErrorClass::Transient | ErrorClass::Unknown => {
                        if !config.should_retry(attempts) {
                            warn!(
                                op = label,
                                attempts,
                                error = %error_str,
                                "Retries exhausted"
                            );
                            return Err(RetryFailure {
                                class,
                                attempts,
                                last_error: error_str,
                            });
                        }
                        let backoff = config.backoff_for_attempt(attempts - 1);
                        warn!(
                            op = label,
                            attempt = attempts,
                            max = config.max_retries,
                            ?backoff,
                            error = %error_str,
                            "Retrying after backoff"
                        );
                        metrics::SUBMISSION_RETRIES.inc();
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(16));
        assert_eq!(config.backoff_for_attempt(4), Duration::from_secs(32));
        assert_eq!(config.backoff_for_attempt(5), Duration::from_secs(60)); // capped
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(classify_error("connection timeout"), ErrorClass::Transient);
        assert_eq!(classify_error("duplicate claim for prophecy"), ErrorClass::AlreadyProcessed);
        assert_eq!(classify_error("execution reverted"), ErrorClass::Permanent);
        assert_eq!(classify_error("Unauthorized: not a validator"), ErrorClass::Permanent);
        assert_eq!(classify_error("some unknown error"), ErrorClass::Unknown);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(eyre!("connection refused"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(eyre!("502 bad gateway")) }
        })
        .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.class, ErrorClass::Transient);
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_permanent() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(eyre!("execution reverted: bad claim")) }
        })
        .await;
        assert_eq!(result.unwrap_err().class, ErrorClass::Permanent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
