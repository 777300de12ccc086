//! The periodic scheduler: two primitives every ingestor and indicator
//! stage is built from.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as i64
}

/// The next wall-clock boundary aligned to `frequency`, strictly after `now`:
/// `next = now - (now mod frequency) + frequency`.
///
/// Alignment matters because indicator intervals must coincide across
/// exchanges and across dependent stages: OHLC at 1m must land on minute
/// boundaries so the 5m stage can aggregate five consecutive rows without
/// ambiguity.
pub fn next_aligned_run(now_ns: i64, frequency: Duration) -> i64 {
    let freq_ns = frequency.as_nanos() as i64;
    if freq_ns == 0 {
        return now_ns;
    }
    now_ns - now_ns.rem_euclid(freq_ns) + freq_ns
}

/// Invokes `task`, waits `period`, forever. Cancellation is implicit: the
/// caller drops the spawned task at process teardown.
pub async fn periodic_loop<F, Fut>(period: Duration, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        task().await;
        tokio::time::sleep(period).await;
    }
}

/// Sleeps until the next wall-clock boundary aligned to `frequency`, then
/// invokes `task(next_run)`, forever.
pub async fn run_every<F, Fut>(frequency: Duration, mut task: F)
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let now = now_ns();
        let next_run = next_aligned_run(now, frequency);
        let wait = Duration::from_nanos((next_run - now).max(0) as u64);
        tokio::time::sleep(wait).await;
        task(next_run).await;
    }
}
