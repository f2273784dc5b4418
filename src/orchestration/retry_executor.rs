//! # Retry Executor
//!
//! Wraps one Action Executor call with bounded exponential backoff.
//!
//! Transient failures are retried up to the policy bound, sleeping
//! `base_delay x multiplier^(attempt-1)` between attempts (capped, optionally
//! jittered, and overridden by an upstream-requested retry delay when the
//! failure carries one). Permanent failures return immediately.
//!
//! The two failure outcomes are deliberately distinct types: an exhausted
//! transient means "service unavailable, safe to retry later at a higher
//! level" and must not be recorded the way a permanent failure is.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BackoffConfig;
use crate::orchestration::error_classifier::{classify, FailureClass};
use crate::orchestration::executor::ActionError;

/// Bounds and shape of the backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap applied to every computed or upstream-requested delay
    pub max_delay: Duration,
    /// Exponential growth factor
    pub multiplier: f64,
    /// Whether to randomize delays to avoid thundering herds
    pub jitter_enabled: bool,
    /// Maximum jitter fraction (0.0 to 1.0)
    pub max_jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter_enabled: true,
            max_jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the loaded backoff configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter_enabled: config.jitter_enabled,
            max_jitter: config.max_jitter,
        }
    }

    /// Delay to sleep after the given failed attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = self
            .base_delay
            .mul_f64(self.multiplier.powi(exponent as i32));
        let capped = delay.min(self.max_delay);
        if self.jitter_enabled && self.max_jitter > 0.0 {
            capped.mul_f64(1.0 + fastrand::f64() * self.max_jitter)
        } else {
            capped
        }
    }
}

/// Failure outcome of a retried execution
#[derive(Debug, Error)]
pub enum RetryError {
    /// The action failed in a way retrying cannot fix
    #[error("permanent failure after {attempts} attempt(s): {error}")]
    Permanent { error: ActionError, attempts: u32 },

    /// Every attempt failed transiently; the service is temporarily
    /// unavailable and a later round may retry
    #[error("transient failures exhausted after {attempts} attempt(s): {error}")]
    Exhausted { error: ActionError, attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn action_error(&self) -> &ActionError {
        match self {
            Self::Permanent { error, .. } | Self::Exhausted { error, .. } => error,
        }
    }

    /// True when this is an exhausted-transient outcome
    pub fn is_exhausted_transient(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Successful outcome with the number of attempts it took
#[derive(Debug)]
pub struct RetrySuccess<T> {
    pub value: T,
    pub attempts: u32,
}

/// Executes fallible operations with classification-aware retries.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is exhausted. The operation receives the 1-based attempt
    /// number; retries are safe to repeat only because actions own their
    /// idempotency.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<RetrySuccess<T>, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ActionError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    debug!(attempt, "action succeeded");
                    return Ok(RetrySuccess { value, attempts: attempt });
                }
                Err(error) => match classify(&error) {
                    FailureClass::Permanent => {
                        warn!(attempt, %error, "action failed permanently");
                        return Err(RetryError::Permanent {
                            error,
                            attempts: attempt,
                        });
                    }
                    FailureClass::Transient => {
                        if attempt >= self.policy.max_attempts {
                            warn!(
                                attempt,
                                %error,
                                "transient failure with attempt budget exhausted"
                            );
                            return Err(RetryError::Exhausted {
                                error,
                                attempts: attempt,
                            });
                        }
                        let delay = error
                            .retry_after
                            .map(|requested| requested.min(self.policy.max_delay))
                            .unwrap_or_else(|| self.policy.backoff_delay(attempt));
                        debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            %error,
                            "transient failure, backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }
    }
}
