//! Async test helpers

use std::future::Future;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that should fail fast (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    Elapsed,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Run a future with a timeout, returning Ok(result) or Err on timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future).await.map_err(|_| TimeoutError::Elapsed)
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Wait for the first broadcast item matching `pred`, skipping lagged gaps
pub async fn recv_matching<T, P>(
    rx: &mut broadcast::Receiver<T>,
    duration: Duration,
    mut pred: P,
) -> Result<T, TimeoutError>
where
    T: Clone,
    P: FnMut(&T) -> bool,
{
    with_timeout(duration, async {
        loop {
            match rx.recv().await {
                Ok(item) if pred(&item) => return Some(item),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await?
    .ok_or(TimeoutError::Elapsed)
}

/// Drain every item currently buffered in a broadcast receiver
pub fn drain_broadcast<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(item) => items.push(item),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return items,
        }
    }
}
