use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{errors::Error, Result};

/// Uniform retry policy applied to every recoverable failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever; `Some(0)` fails on the first error.
    pub max_retries: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn fail_fast() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::default()
        }
    }

    /// Retry forever with a constant pause.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_retries: None,
            base_delay: delay,
            max_delay: delay,
        }
    }

    /// Whether retry number `attempt` (0-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.map_or(true, |max| attempt < max)
    }

    /// Pause before retry number `attempt` (0-based): exponential, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted.
///
/// Both the call and the backoff pause race `cancel`; cancellation yields
/// `Error::Cancelled`.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = op() => r,
        };
        match outcome {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && policy.allows(attempt) => {
                let wait = policy.delay_for(attempt);
                tracing::warn!("{what} failed (retry {} in {wait:?}): {e}", attempt + 1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = sleep(wait) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
