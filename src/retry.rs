//! Backoff-controlled re-execution of fallible async operations.
//!
//! A `RetryPolicy` is a plain value composed around an operation by calling
//! [`RetryPolicy::execute`]. Only errors whose [`ErrorKind`] is in the
//! policy's retryable set are retried; everything else propagates on the
//! first failure.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{ErrorKind, PipelineError};

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

impl std::fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffStrategy::Fixed => write!(f, "fixed"),
            BackoffStrategy::Linear => write!(f, "linear"),
            BackoffStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for BackoffStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(BackoffStrategy::Fixed),
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            _ => anyhow::bail!(
                "Invalid backoff strategy '{}'. Valid values: fixed, linear, exponential",
                s
            ),
        }
    }
}

/// Abstraction over waiting so tests can observe delays without sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Longest single wait between attempts.
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// `delay * factor`, saturating at [`MAX_DELAY`] when the product is not
/// representable.
fn scale_delay(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}

#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub strategy: BackoffStrategy,
    pub backoff_factor: f64,
    retry_on: HashSet<ErrorKind>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("strategy", &self.strategy)
            .field("backoff_factor", &self.backoff_factor)
            .field("retry_on", &self.retry_on)
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        strategy: BackoffStrategy,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            strategy,
            backoff_factor,
            retry_on: HashSet::from([ErrorKind::Retryable]),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Model weight download: 3 attempts, 5s, doubling.
    pub fn for_model_download() -> Self {
        Self::new(3, Duration::from_secs(5), BackoffStrategy::Exponential, 2.0)
    }

    /// Model load: 3 attempts, 3s, doubling.
    pub fn for_model_load() -> Self {
        Self::new(3, Duration::from_secs(3), BackoffStrategy::Exponential, 2.0)
    }

    /// Per-file enhancement default: 2 attempts, 1s, fixed.
    pub fn for_file() -> Self {
        Self::new(2, Duration::from_secs(1), BackoffStrategy::Fixed, 2.0)
    }

    /// Replace the set of error kinds that trigger another attempt.
    pub fn retrying_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn should_retry(&self, err: &PipelineError) -> bool {
        let kind = err.kind();
        kind != ErrorKind::NonRetryable && self.retry_on.contains(&kind)
    }

    /// Delay that follows `current` under this policy's strategy, capped at
    /// [`MAX_DELAY`].
    pub fn next_delay(&self, current: Duration) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => current,
            BackoffStrategy::Linear => current
                .saturating_add(scale_delay(self.initial_delay, self.backoff_factor))
                .min(MAX_DELAY),
            BackoffStrategy::Exponential => scale_delay(current, self.backoff_factor),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted. The last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.max_attempts && self.should_retry(&err) => {
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    delay = self.next_delay(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_file()
    }
}
