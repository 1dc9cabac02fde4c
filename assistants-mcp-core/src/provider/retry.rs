//! Retry logic for provider calls
//!
//! Exponential backoff with jitter for transient backend failures. A
//! backend-supplied `Retry-After` wins over the computed delay.

use crate::error::{AssistantsError, Result};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);

        let clamped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.add_jitter {
            clamped_delay + clamped_delay * 0.25 * rand_jitter()
        } else {
            clamped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Pseudo-random value in `[0, 1)`, good enough to spread retries apart
fn rand_jitter() -> f64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEED: AtomicU64 = AtomicU64::new(0);

    const A: u64 = 1103515245;
    const C: u64 = 12345;
    const M: u64 = 1 << 31;

    let seed = SEED.fetch_add(1, Ordering::Relaxed);
    let time_component = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let next = (A.wrapping_mul(seed.wrapping_add(time_component)).wrapping_add(C)) % M;
    (next as f64) / (M as f64)
}

/// Tracks attempts made against a [`RetryConfig`]
#[derive(Debug)]
pub struct RetryState {
    config: RetryConfig,
    attempt: usize,
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn record_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Whether another attempt is allowed after a failure with `error`
    pub fn should_retry(&self, error: &AssistantsError) -> bool {
        self.has_attempts_left() && error.is_retryable()
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.config.max_attempts
    }

    /// Delay before the next attempt, honouring a backend retry hint
    pub fn next_delay(&self, error: &AssistantsError) -> Duration {
        let hinted = match error.root_cause() {
            AssistantsError::Provider(e) => e.retry_after,
            _ => None,
        };
        match hinted {
            Some(delay) => delay.min(self.config.max_delay),
            None => self.config.delay_for_attempt(self.attempt.saturating_sub(1)),
        }
    }

    pub fn current_attempt(&self) -> usize {
        self.attempt
    }
}

/// Run `operation`, retrying retryable failures with backoff
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    with_retry_when(config, AssistantsError::is_retryable, operation).await
}

/// Run `operation`, retrying only failures that `retryable` accepts
pub async fn with_retry_when<P, F, Fut, T>(
    config: &RetryConfig,
    retryable: P,
    operation: F,
) -> Result<T>
where
    P: Fn(&AssistantsError) -> bool,
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut state = RetryState::new(config.clone());

    loop {
        state.record_attempt();
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !state.has_attempts_left() || !retryable(&e) {
                    return Err(e);
                }

                let delay = state.next_delay(&e);
                tracing::debug!(
                    attempt = state.current_attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying provider call"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
