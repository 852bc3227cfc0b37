//! Bounded retry with a fixed delay, and cancellable waits
//!
//! Every failure is retried the same way: there is no backoff, no jitter and
//! no distinction between transient and permanent errors. A permanently
//! malformed request is attempted `max_attempts` times.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::StoreTestError;

/// Attempts used by the retrying store calls
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Delay between attempts used by the retrying store calls
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Raised when a wait is cancelled. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wait interrupted by cancellation")]
pub struct Interrupted;

impl From<Interrupted> for StoreTestError {
    fn from(_: Interrupted) -> Self {
        StoreTestError::Interrupted
    }
}

/// Cooperative cancellation shared between the caller and running waits
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: watch::Sender<bool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // the sender lives in self, so the channel cannot close while we wait
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sleep for `duration` unless `token` is cancelled first
pub async fn sleep_cancellable(duration: Duration, token: &CancellationToken) -> Result<(), Interrupted> {
    if token.is_cancelled() {
        return Err(Interrupted);
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = token.cancelled() => Err(Interrupted),
    }
}

/// Retry parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Interrupted> + std::fmt::Display,
    {
        retry_with_cancellation(operation, self.max_attempts, self.delay, &CancellationToken::new()).await
    }
}

/// Invoke `operation` up to `max_attempts` times, waiting `delay` between
/// failed attempts. The last failure is returned unchanged.
pub async fn retry<T, E, F, Fut>(operation: F, max_attempts: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Interrupted> + std::fmt::Display,
{
    retry_with_cancellation(operation, max_attempts, delay, &CancellationToken::new()).await
}

/// [`retry`], with the inter-attempt wait abandoned when `token` is cancelled.
///
/// A `max_attempts` of zero still performs one attempt.
pub async fn retry_with_cancellation<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    delay: Duration,
    token: &CancellationToken,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Interrupted> + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                log::debug!("Attempt {}/{} failed, giving up: {}", attempt, max_attempts, e);
                return Err(e);
            }
            Err(e) => {
                log::debug!(
                    "Attempt {}/{} failed, retrying in {:?}: {}",
                    attempt,
                    max_attempts,
                    delay,
                    e
                );
                sleep_cancellable(delay, token).await?;
                attempt += 1;
            }
        }
    }
}
