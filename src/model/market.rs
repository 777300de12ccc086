//! Active-market tracking and per-market trade watermarks.
//!
//! Both tables are guarded by a single mutex with short critical sections,
//! matching the "short critical sections over map get/set" discipline
//! described for these resources.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Market {
    pub name: String,
    pub is_active: bool,
}

/// Tracks, per market, the highest trade id already ingested -- the
/// watermark the market-history pull loop uses to avoid re-emitting trades,
/// and the missing-trade reconciler uses as a sanity cross-check.
#[derive(Default)]
pub struct MarketTable {
    markets: Mutex<HashMap<String, Market>>,
    watermarks: Mutex<HashMap<String, i64>>,
}

impl MarketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, name: &str, is_active: bool) {
        let mut guard = self.markets.lock();
        guard
            .entry(name.to_string())
            .and_modify(|m| m.is_active = is_active)
            .or_insert_with(|| Market {
                name: name.to_string(),
                is_active,
            });
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.markets.lock().contains_key(name)
    }

    pub fn active_markets(&self) -> Vec<String> {
        self.markets
            .lock()
            .values()
            .filter(|m| m.is_active)
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn watermark(&self, market: &str) -> i64 {
        *self.watermarks.lock().get(market).unwrap_or(&0)
    }

    /// CAS semantics: the watermark only ever moves forward. Returns the
    /// watermark in effect after the call (property 4: monotonicity).
    pub fn advance_watermark(&self, market: &str, candidate: i64) -> i64 {
        let mut guard = self.watermarks.lock();
        let entry = guard.entry(market.to_string()).or_insert(0);
        if candidate > *entry {
            *entry = candidate;
        }
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_never_decreases() {
        let table = MarketTable::new();
        assert_eq!(table.advance_watermark("BTC_ETH", 105), 105);
        assert_eq!(table.advance_watermark("BTC_ETH", 50), 105);
        assert_eq!(table.advance_watermark("BTC_ETH", 107), 107);
    }

    #[test]
    fn markets_are_inserted_on_first_sighting() {
        let table = MarketTable::new();
        assert!(!table.is_known("BTC_ETH"));
        table.upsert("BTC_ETH", true);
        assert!(table.is_known("BTC_ETH"));
        assert_eq!(table.active_markets(), vec!["BTC_ETH".to_string()]);
    }
}
