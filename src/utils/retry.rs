// Retry executor with exponential backoff and jitter
// Author: kelexine (https://github.com/kelexine)

use crate::config::RetryConfig;
use crate::error::ErrorClass;
use crate::metrics;
use backoff::{backoff::Backoff, ExponentialBackoff};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors the executor can classify.
pub trait RetryableError: Sized {
    fn class(&self) -> ErrorClass;

    /// Delay the upstream asked for, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Error reported when an attempt exceeds the per-attempt timeout.
    fn timed_out(after: Duration) -> Self;
}

/// Backoff schedule and attempt bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub jitter: bool,
    /// Upper bound for a single attempt; `None` leaves attempts unbounded.
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig, attempt_timeout: Duration) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
            jitter: config.jitter,
            attempt_timeout: Some(attempt_timeout),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0, // jitter is added separately, in [0, delay)
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), Duration::from_secs(20))
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Per-call retry bookkeeping. Lives only for one orchestrated call.
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    max_delay: Duration,
    last_error: Option<ErrorClass>,
    next_delay: Option<Duration>,
    delays: Vec<Duration>,
    backoff: ExponentialBackoff,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts.max(1),
            max_delay: policy.max_delay,
            last_error: None,
            next_delay: None,
            delays: Vec::new(),
            backoff: policy.backoff(),
        }
    }

    /// Mark the start of a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.next_delay = None;
        self.attempt
    }

    /// Record a failed attempt and decide whether another one follows.
    ///
    /// Non-retryable classes and exhausted budgets give up; otherwise the next
    /// exponential delay is scheduled. An upstream hint can only lengthen the wait, and
    /// delays never shrink from one attempt to the next.
    pub fn on_failure(&mut self, class: ErrorClass, hint: Option<Duration>) -> RetryDecision {
        self.last_error = Some(class);
        if !class.is_retryable() || self.attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let scheduled = self.backoff.next_backoff().unwrap_or(self.max_delay);
        let floor = self.delays.last().copied().unwrap_or(Duration::ZERO);
        let delay = hint
            .map_or(scheduled, |h| h.max(scheduled))
            .max(floor)
            .min(self.max_delay);
        self.next_delay = Some(delay);
        self.delays.push(delay);
        RetryDecision::RetryAfter(delay)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<ErrorClass> {
        self.last_error
    }

    pub fn next_delay(&self) -> Option<Duration> {
        self.next_delay
    }

    /// Delays scheduled so far, jitter excluded.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

/// Random extra wait in `[0, delay)`.
pub fn jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..millis))
}

/// Attempt bookkeeping for a call that eventually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// Terminal failure: the last error plus how we got there.
#[derive(Debug, Clone)]
pub struct RetryFailure<E> {
    pub error: E,
    pub class: ErrorClass,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
///
/// The executor has no side effects beyond the calls it makes; callers decide what
/// to cache or bill once the outcome is known.
pub async fn execute<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<(T, RetryReport), RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut state = RetryState::new(policy);

    loop {
        let attempt = state.begin_attempt();

        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(limit)),
            },
            None => operation().await,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok((
                    value,
                    RetryReport {
                        attempts: attempt,
                        delays: state.delays.clone(),
                    },
                ));
            }
            Err(error) => error,
        };

        let class = error.class();
        metrics::record_retry_attempt(operation_name, class.as_str());

        match state.on_failure(class, error.retry_after()) {
            RetryDecision::GiveUp => {
                if class.is_retryable() {
                    warn!(
                        "{} giving up after {} attempts: {} ({})",
                        operation_name, attempt, class, error
                    );
                } else {
                    debug!(
                        "{} failed with non-retryable {} on attempt {}",
                        operation_name, class, attempt
                    );
                }
                return Err(RetryFailure {
                    error,
                    class,
                    attempts: attempt,
                    delays: state.delays.clone(),
                });
            }
            RetryDecision::RetryAfter(delay) => {
                let wait = if policy.jitter { delay + jitter(delay) } else { delay };
                warn!(
                    "{} failed with {} (attempt {}), retrying after {}ms",
                    operation_name,
                    class,
                    attempt,
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
