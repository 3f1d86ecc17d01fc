//! Bounded retry-with-backoff for readiness probes and long-running
//! operation polling.
//!
//! Provisioning a domain controller involves waits with no event to block
//! on: a VM reboots after forest promotion, the directory service comes up
//! some time later, and ARM long-running operations finish asynchronously.
//! Instead of fixed sleeps, callers describe a [`RetryPolicy`] and get a
//! typed error back when the budget is exhausted:
//!
//! ```rust,ignore
//! use dcforge::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(10)
//!     .initial_delay(Duration::from_secs(15))
//!     .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
//!     .max_delay(Duration::from_secs(120))
//!     .build();
//!
//! let status = policy
//!     .execute_until(|| async { client.operation_status(&url).await }, |s| s.is_terminal())
//!     .await?;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Linear backoff: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (attempt as f64 + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis as u64)
    }
}

/// Jitter strategy for adding randomness to delays.
///
/// Jitter spreads out probe traffic when several deployments poll the same
/// management endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    None,

    /// Full jitter: random value between 0 and calculated delay.
    Full,

    /// Equal jitter: half the delay plus random jitter.
    /// delay = calculated_delay/2 + random(0, calculated_delay/2)
    Equal,
}

impl Default for JitterStrategy {
    fn default() -> Self {
        Self::None
    }
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;

        let jittered_millis = match self {
            Self::None => delay_millis,
            Self::Full => {
                if delay_millis > 0.0 {
                    rng.gen_range(0.0..delay_millis)
                } else {
                    0.0
                }
            }
            Self::Equal => {
                let half = delay_millis / 2.0;
                if half > 0.0 {
                    half + rng.gen_range(0.0..half)
                } else {
                    0.0
                }
            }
        };

        Duration::from_millis(jittered_millis.max(0.0) as u64)
    }
}

/// Retry policy configuration.
///
/// Defines how retries should be performed: maximum attempts, delay between
/// attempts, backoff growth, and an optional cap on total wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, just the
    /// initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth).
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Maximum total time to spend retrying (including execution time).
    #[serde(with = "humantime_serde")]
    pub max_total_time: Option<Duration>,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_total_time: None,
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Create a policy with simple constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
            ..Default::default()
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterStrategy::None,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        let capped_delay = base_delay.min(self.max_delay);
        self.jitter.apply(capped_delay)
    }

    /// Check if retrying should continue based on attempt count.
    pub fn should_continue(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Execute an async operation with retry logic.
    ///
    /// Returns the result of the operation, or the last error if all retries
    /// fail.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Debug,
    {
        let start_time = std::time::Instant::now();
        let mut attempt = 0;

        loop {
            if let Some(max_total) = self.max_total_time {
                if start_time.elapsed() >= max_total {
                    return Err(RetryError::TotalTimeoutExceeded {
                        attempts: attempt,
                        elapsed: start_time.elapsed(),
                    });
                }
            }

            debug!("Attempt {} of {}", attempt + 1, self.max_retries + 1);

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {:?}", attempt + 1, e);

                    if !self.should_continue(attempt) {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            elapsed: start_time.elapsed(),
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }

    /// Execute an async operation until a success condition holds.
    ///
    /// The operation is retried until the condition returns true, the retry
    /// budget is exhausted, or the total timeout elapses. A `false`
    /// condition is the "not ready yet" case; it consumes an attempt exactly
    /// like an error does.
    pub async fn execute_until<F, Fut, T, E, C>(
        &self,
        mut operation: F,
        success_condition: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Debug,
        C: Fn(&T) -> bool,
    {
        let start_time = std::time::Instant::now();
        let mut attempt = 0;

        loop {
            if let Some(max_total) = self.max_total_time {
                if start_time.elapsed() >= max_total {
                    return Err(RetryError::ConditionNotMet {
                        attempts: attempt,
                        elapsed: start_time.elapsed(),
                    });
                }
            }

            debug!(
                "Attempt {} of {} (until condition)",
                attempt + 1,
                self.max_retries + 1
            );

            match operation().await {
                Ok(result) => {
                    if success_condition(&result) {
                        if attempt > 0 {
                            debug!("Condition met after {} retries", attempt);
                        }
                        return Ok(result);
                    }

                    if !self.should_continue(attempt) {
                        return Err(RetryError::ConditionNotMet {
                            attempts: attempt + 1,
                            elapsed: start_time.elapsed(),
                        });
                    }
                }
                Err(e) => {
                    warn!("Attempt {} failed with error: {:?}", attempt + 1, e);

                    if !self.should_continue(attempt) {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            elapsed: start_time.elapsed(),
                            last_error: e,
                        });
                    }
                }
            }

            let delay = self.delay_for_attempt(attempt);
            debug!("Waiting {:?} before retry (not ready)", delay);
            tokio::time::sleep(delay).await;

            attempt += 1;
        }
    }
}

/// Builder for constructing [`RetryPolicy`] instances.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the maximum total time for all retry attempts.
    pub fn max_total_time(mut self, timeout: Duration) -> Self {
        self.policy.max_total_time = Some(timeout);
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff = strategy;
        self
    }

    /// Set the jitter strategy.
    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.policy.jitter = strategy;
        self
    }

    /// Build the [`RetryPolicy`].
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Error type for retry operations.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Maximum number of retries exceeded.
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// Total elapsed time.
        elapsed: Duration,
        /// The last error encountered.
        last_error: E,
    },

    /// Total time limit exceeded.
    TotalTimeoutExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// Total elapsed time.
        elapsed: Duration,
    },

    /// Success condition was never met: the target never became ready.
    ConditionNotMet {
        /// Number of attempts made.
        attempts: u32,
        /// Total elapsed time.
        elapsed: Duration,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::MaxRetriesExceeded { attempts, .. }
            | RetryError::TotalTimeoutExceeded { attempts, .. }
            | RetryError::ConditionNotMet { attempts, .. } => *attempts,
        }
    }

    /// Total wall-clock time spent.
    pub fn elapsed(&self) -> Duration {
        match self {
            RetryError::MaxRetriesExceeded { elapsed, .. }
            | RetryError::TotalTimeoutExceeded { elapsed, .. }
            | RetryError::ConditionNotMet { elapsed, .. } => *elapsed,
        }
    }
}

impl RetryError<crate::error::Error> {
    /// Collapse into the crate error type: exhaustion becomes
    /// [`Error::NotReady`](crate::error::Error::NotReady); a hard error from
    /// the last attempt passes through unchanged.
    pub fn into_not_ready(self, what: &str) -> crate::error::Error {
        match self {
            RetryError::MaxRetriesExceeded { last_error, .. } => last_error,
            RetryError::TotalTimeoutExceeded { attempts, elapsed }
            | RetryError::ConditionNotMet { attempts, elapsed } => {
                crate::error::Error::NotReady {
                    what: what.to_string(),
                    attempts,
                    elapsed_secs: elapsed.as_secs(),
                }
            }
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::MaxRetriesExceeded {
                attempts,
                last_error,
                ..
            } => {
                write!(
                    f,
                    "Max retries exceeded after {} attempts. Last error: {}",
                    attempts, last_error
                )
            }
            RetryError::TotalTimeoutExceeded { attempts, elapsed } => {
                write!(
                    f,
                    "Total timeout exceeded after {} attempts ({:?} elapsed)",
                    attempts, elapsed
                )
            }
            RetryError::ConditionNotMet { attempts, elapsed } => {
                write!(
                    f,
                    "Not ready after {} attempts ({:?} elapsed)",
                    attempts, elapsed
                )
            }
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for RetryError<E> {}
