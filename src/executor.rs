//! The request executor: run one I/O attempt with retry-until-deadline.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::error;

/// Runs `request` until it succeeds or `deadline` elapses since the first
/// attempt, sleeping 5 seconds between failures. Returns `true` on success,
/// `false` on timeout. Never panics, never blocks past the deadline.
///
/// `period` is the caller's own polling period; the deadline is
/// `max(period * 2/3, 1 hour)` so a stuck request gives up with enough
/// margin for the next scheduled tick to retry cleanly, rather than piling
/// retries on top of each other.
pub async fn execute_with_retry<F, Fut, E>(period: Duration, error_label: &str, mut request: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let deadline = retry_deadline(period);
    let begin = Instant::now();

    loop {
        match request().await {
            Ok(()) => return true,
            Err(err) => {
                error!(error = %err, label = error_label, "request failed");
                tokio::time::sleep(Duration::from_secs(5)).await;
                if begin.elapsed() > deadline {
                    error!(label = error_label, "request timeout");
                    return false;
                }
            }
        }
    }
}

pub fn retry_deadline(period: Duration) -> Duration {
    std::cmp::max(period * 2 / 3, Duration::from_secs(3600))
}
