// src/retry.rs
//! Bounded exponential retry around one unreliable external call.
//!
//! The delay after failed attempt `k` (1-based) is
//! `min(base_delay * 2^(k-1), max_delay)`. There is no sleep after the final
//! attempt. Every attempt runs under `attempt_timeout`; sleeping goes through a
//! [`Clock`] so the schedule can be asserted in tests.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            attempt_timeout: Duration::from_millis(60_000),
        }
    }
}

impl RetryPolicy {
    /// Delay scheduled after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication rejected (status {0})")]
    Auth(u16),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("daily call budget exhausted")]
    BudgetExhausted,
}

impl CallError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => CallError::Auth(status),
            _ => CallError::Http {
                status,
                body: body.into(),
            },
        }
    }

    /// Timeouts, 5xx, 429, transport and parse errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Timeout(_) | CallError::Transport(_) | CallError::Parse(_) => true,
            CallError::Http { status, .. } => *status >= 500 || *status == 429,
            CallError::Auth(_) | CallError::BudgetExhausted => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Timeout(_) => "timeout",
            CallError::Http { .. } => "http",
            CallError::Transport(_) => "transport",
            CallError::Auth(_) => "auth",
            CallError::Parse(_) => "parse",
            CallError::BudgetExhausted => "budget",
        }
    }
}

/// Returned once retries are exhausted or a non-retryable error occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {cause}")]
pub struct TerminalFailure {
    pub cause: CallError,
    pub attempts: u32,
}

impl TerminalFailure {
    pub fn retryable(&self) -> bool {
        self.cause.is_retryable()
    }
}

/// Source of sleeps between attempts.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock: records requested sleeps and returns immediately.
#[derive(Debug, Default, Clone)]
pub struct RecordingClock {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Run `op` until it succeeds, fails non-retryably, or `policy.max_attempts`
/// is reached. `op` receives the 1-based attempt number.
pub async fn call<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    label: &'static str,
    mut op: F,
) -> Result<T, TerminalFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        counter!("retry_attempts_total", "call" => label).increment(1);

        let outcome = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(r) => r,
            Err(_) => Err(CallError::Timeout(policy.attempt_timeout)),
        };
        let err = match outcome {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        if !err.is_retryable() {
            warn!(target: "retry", call = label, attempt, error = %err, "non-retryable failure");
            return Err(TerminalFailure {
                cause: err,
                attempts: attempt,
            });
        }
        if attempt >= max_attempts {
            warn!(target: "retry", call = label, attempt, error = %err, "retries exhausted");
            return Err(TerminalFailure {
                cause: err,
                attempts: attempt,
            });
        }

        let delay = policy.delay_after(attempt);
        debug!(
            target: "retry",
            call = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying"
        );
        clock.sleep(delay).await;
    }
}
