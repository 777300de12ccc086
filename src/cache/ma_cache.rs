//! Per-(exchange, period) EMA seed cache: the previous interval's EMA for
//! each market and each MA length, so the next run can compute
//! `ema = (close - seed) * multiplier + seed` without re-deriving history.
//!
//! Open question resolved here: the seed lookup is indexed by the loop
//! variable carrying the MA length (`i`), never by a fixed index -- each
//! length's EMA seeds forward independently.

use super::CacheKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

type MarketEmaSeeds = HashMap<String, HashMap<usize, f64>>;

#[derive(Default)]
pub struct EmaSeedCache {
    data: RwLock<HashMap<CacheKey, MarketEmaSeeds>>,
}

impl EmaSeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, exchange: &str, period: Duration, market: &str, length: usize) -> Option<f64> {
        self.data
            .read()
            .get(&(exchange.to_string(), period))?
            .get(market)?
            .get(&length)
            .copied()
    }

    pub fn set_seed(&self, exchange: &str, period: Duration, market: &str, length: usize, value: f64) {
        let mut guard = self.data.write();
        let per_market = guard
            .entry((exchange.to_string(), period))
            .or_insert_with(HashMap::new);
        per_market
            .entry(market.to_string())
            .or_insert_with(HashMap::new)
            .insert(length, value);
    }
}
