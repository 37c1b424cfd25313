use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use crate::page_query::PageQueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptBound {
    Bounded(usize),
    /// Only the run watchdog ends an unbounded poll.
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub bound: AttemptBound,
    pub backoff: Backoff,
}

impl PollPolicy {
    pub fn bounded(attempts: usize, interval: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            bound: AttemptBound::Bounded(attempts),
            backoff: Backoff::Fixed,
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            bound: AttemptBound::Unbounded,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay slept after the 1-based `attempt` failed.
    pub fn delay_after_attempt(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max } => {
                let exponent = attempt.saturating_sub(1).min(10) as u32;
                self.interval
                    .checked_mul(1_u32 << exponent)
                    .unwrap_or(max)
                    .min(max)
            }
        }
    }

    fn max_attempts(&self) -> Option<usize> {
        match self.bound {
            AttemptBound::Bounded(attempts) => Some(attempts.max(1)),
            AttemptBound::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("'{label}' not satisfied after {attempts} attempts (last: {last_diagnostic})")]
    Exhausted {
        label: String,
        attempts: usize,
        last_diagnostic: String,
    },
    #[error("'{label}' aborted: {source}")]
    Fatal {
        label: String,
        #[source]
        source: PageQueryError,
    },
}

/// Repeats `action` until it yields `Some`, sleeping per `policy` between
/// attempts. `None` and transient query errors are retried; any other error
/// aborts immediately.
///
/// The action receives `state` mutably on every attempt so it can drive the
/// browser session without capturing it.
pub async fn poll_until<S, T, F>(
    label: &str,
    policy: &PollPolicy,
    state: &mut S,
    mut action: F,
) -> Result<T, PollError>
where
    S: Send,
    F: for<'s> FnMut(&'s mut S, usize) -> BoxFuture<'s, Result<Option<T>, PageQueryError>>,
{
    if !policy.initial_delay.is_zero() {
        tokio::time::sleep(policy.initial_delay).await;
    }

    let max_attempts = policy.max_attempts();
    let mut last_diagnostic = String::from("no attempt made");
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match action(state, attempt).await {
            Ok(Some(value)) => {
                debug!(label, attempt, "poll satisfied");
                return Ok(value);
            }
            Ok(None) => {
                last_diagnostic = "condition not met".to_string();
                debug!(label, attempt, "condition not met, retrying");
            }
            Err(error) if error.is_transient() => {
                last_diagnostic = error.to_string();
                debug!(label, attempt, error = %error, "transient failure, retrying");
            }
            Err(error) => {
                warn!(label, attempt, error = %error, "poll aborted");
                return Err(PollError::Fatal {
                    label: label.to_string(),
                    source: error,
                });
            }
        }

        if let Some(max_attempts) = max_attempts {
            if attempt >= max_attempts {
                warn!(
                    label,
                    attempts = attempt,
                    last_diagnostic = %last_diagnostic,
                    "retries exhausted"
                );
                return Err(PollError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    last_diagnostic,
                });
            }
        }

        let delay = policy.delay_after_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
