//! Subscription Manager (4.E): discovers markets, subscribes push feeds,
//! and dispatches one worker per market. Invariant: at most one worker per
//! market at any time.

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Holds the handle of the worker task subscribed to a market's push
/// stream. Dropping the handle's owning `SubscriptionTable` entry does not
/// abort the task; cancellation is by process shutdown (per the design
/// notes on push-stream subscriptions).
pub struct SubscriptionTable {
    subscriptions: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, market: &str) -> bool {
        self.subscriptions.read().contains_key(market)
    }

    /// Markets present in `current_markets` that have no worker yet.
    pub fn unsubscribed_markets(&self, current_markets: &[String]) -> Vec<String> {
        let guard = self.subscriptions.read();
        current_markets
            .iter()
            .filter(|m| !guard.contains_key(*m))
            .cloned()
            .collect()
    }

    /// Registers a worker's handle for `market`. If one is already present
    /// (a race between two discovery ticks), the existing worker is
    /// aborted in favor of the new one so there is only ever one per
    /// market.
    pub fn insert(&self, market: String, handle: JoinHandle<()>) {
        let mut guard = self.subscriptions.write();
        if let Some(previous) = guard.insert(market, handle) {
            previous.abort();
        }
    }

    pub fn market_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn newly_discovered_markets_get_a_worker_each() {
        let table = SubscriptionTable::new();
        let discovered = vec!["BTC_ETH".to_string(), "BTC_XMR".to_string()];

        for market in table.unsubscribed_markets(&discovered) {
            table.insert(market, tokio::spawn(async {}));
        }

        assert_eq!(table.market_count(), 2);
        assert!(table.is_subscribed("BTC_ETH"));
    }

    #[tokio::test]
    async fn a_market_already_subscribed_is_not_rediscovered() {
        let table = SubscriptionTable::new();
        table.insert("BTC_ETH".to_string(), tokio::spawn(async {}));

        let still_missing = table.unsubscribed_markets(&["BTC_ETH".to_string(), "BTC_XMR".to_string()]);
        assert_eq!(still_missing, vec!["BTC_XMR".to_string()]);
    }
}
