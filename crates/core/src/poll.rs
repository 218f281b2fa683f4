use crate::error::{ReconcileError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fixed-interval polling with an upper bound on attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(20), max_attempts: 90 }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts: max_attempts.max(1) }
    }
}

/// Calls `check` until it reports `true`, sleeping `policy.interval` between tries.
pub async fn poll_until<F, Fut>(what: &str, policy: PollPolicy, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=policy.max_attempts {
        if check().await? {
            debug!(what, attempt, "poll condition reached");
            return Ok(());
        }
        if attempt < policy.max_attempts {
            debug!(what, attempt, interval_secs = policy.interval.as_secs(), "waiting");
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(ReconcileError::Timeout { what: what.to_string(), attempts: policy.max_attempts })
}
