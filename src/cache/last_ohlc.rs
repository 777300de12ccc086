//! Per-(exchange, period) sliding window of recent OHLC rows, keyed by
//! interval start then market. Every higher-period fold (OBV, MA, RSI) reads
//! from this cache instead of re-querying the store for history it already
//! has.

use super::CacheKey;
use crate::model::Ohlc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

type IntervalMarketOhlc = HashMap<i64, HashMap<String, Ohlc>>;

#[derive(Default)]
pub struct LastOhlcCache {
    data: RwLock<HashMap<CacheKey, IntervalMarketOhlc>>,
}

impl LastOhlcCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the cache has nothing for this key, or holds strictly more
    /// intervals than the current window needs -- in both cases the caller
    /// should rebuild from the store before merging fresh rows in.
    pub fn needs_rebuild(&self, exchange: &str, period: Duration, window_len: usize) -> bool {
        match self.data.read().get(&(exchange.to_string(), period)) {
            None => true,
            Some(existing) => existing.len() > window_len,
        }
    }

    pub fn snapshot(&self, exchange: &str, period: Duration) -> Option<IntervalMarketOhlc> {
        self.data
            .read()
            .get(&(exchange.to_string(), period))
            .cloned()
    }

    pub fn replace(&self, exchange: &str, period: Duration, data: IntervalMarketOhlc) {
        self.data
            .write()
            .insert((exchange.to_string(), period), data);
    }

    /// Merges newly computed rows into the cache, then trims the oldest
    /// intervals beyond `time_intervals`'s length by stepping `period`
    /// backwards from `time_intervals[0]`.
    pub fn merge_and_trim(
        &self,
        exchange: &str,
        period: Duration,
        new_rows: IntervalMarketOhlc,
        time_intervals: &[i64],
    ) {
        if time_intervals.is_empty() {
            return;
        }
        let mut guard = self.data.write();
        let Some(cached) = guard.get_mut(&(exchange.to_string(), period)) else {
            return;
        };

        for (interval, markets) in new_rows {
            cached.insert(interval, markets);
        }

        let period_ns = period.as_nanos() as i64;
        let mut interval = time_intervals[0];
        while cached.len() > time_intervals.len() {
            interval -= period_ns;
            cached.remove(&interval);
        }
    }
}
