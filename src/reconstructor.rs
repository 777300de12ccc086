//! Order-Book Reconstructor (4.F, Poloniex-style): snapshot plus
//! sequenced incremental replay, with periodic hard-refetch and gap-loss
//! accounting.

use crate::error::SequencingError;
use crate::indicators::market_depth;
use crate::model::{BookUpdate, MarketTable, OrderBook};
use crate::scheduler;
use crate::store::{PointStore, Query};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct OrderBookTable {
    books: RwLock<HashMap<String, OrderBook>>,
}

impl OrderBookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, market: &str, book: OrderBook) {
        self.books.write().insert(market.to_string(), book);
    }

    pub fn get(&self, market: &str) -> Option<OrderBook> {
        self.books.read().get(market).cloned()
    }

    /// Replays `updates` (any order) against `market`'s book: only updates
    /// with `sequence > book.sequence` apply (property 5, idempotence
    /// under repeats); the remainder re-sort and recompute cumulative sums
    /// once as a single bundle.
    pub fn apply_bundle(&self, market: &str, mut updates: Vec<BookUpdate>) {
        let mut guard = self.books.write();
        let Some(book) = guard.get_mut(market) else { return };

        updates.sort_by_key(|u| u.sequence);
        let mut applied_any = false;

        for update in updates {
            if update.sequence <= book.sequence {
                continue;
            }
            book.apply_update(update.order_type, update.rate, update.quantity);
            book.sequence = update.sequence;
            applied_any = true;
        }

        if applied_any {
            book.resort_and_recompute();
        }
    }
}

/// `missing = sum(sequence_i - sequence_{i-1} - 1)` over consecutive
/// sequences (ascending order); `loss = 100 * missing / count`.
pub fn gap_loss(sequences: &[i64]) -> f64 {
    if sequences.len() < 2 {
        return 0.0;
    }

    let missing: i64 = sequences
        .windows(2)
        .map(|w| (w[1] - w[0] - 1).max(0))
        .sum();

    100.0 * missing as f64 / sequences.len() as f64
}

/// Runs the hard-refetch cadence (4.F): every `check_period`, re-reads each
/// market's `book_updates` sequence numbers since the last tick and logs any
/// gap loss; every `hard_fetch_frequency`-th tick, re-derives the book from
/// the store's `book_orders_last_check` + `book_orders` (joined on the
/// last-check row's timestamp) and replaces the live table's entry with it,
/// resynchronizing past whatever the gap-loss accounting found.
pub async fn run_hard_refetch(
    markets: Arc<MarketTable>,
    store: Arc<dyn PointStore>,
    books: Arc<OrderBookTable>,
    check_period: Duration,
    hard_fetch_frequency: u32,
) {
    let hard_fetch_frequency = hard_fetch_frequency.max(1);
    let mut tick: u32 = 0;

    loop {
        tick = tick.wrapping_add(1);
        let now_ns = scheduler::now_ns();
        let from_ns = now_ns - check_period.as_nanos() as i64;

        for market in markets.active_markets() {
            check_gap_loss(&market, store.as_ref(), from_ns, now_ns).await;
        }

        if tick % hard_fetch_frequency == 0 {
            for market in markets.active_markets() {
                hard_refetch_one(&market, store.as_ref(), books.as_ref()).await;
            }
        }

        tokio::time::sleep(check_period).await;
    }
}

/// Reads `market`'s `book_updates` sequence numbers over `[from_ns, now_ns)`,
/// logs each arithmetic gap individually via `SequencingError::BookSequenceGap`,
/// and logs the aggregate `gap_loss` when it is non-zero.
async fn check_gap_loss(market: &str, store: &dyn PointStore, from_ns: i64, now_ns: i64) {
    let query = Query::new("book_updates", from_ns, now_ns).tag("market", market);
    let rows = match store.query(&query).await {
        Ok(rows) => rows,
        Err(err) => {
            error!(error = %err, %market, "reconstructor: book_updates query failed");
            return;
        }
    };

    let mut sequences: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.fields.get("sequence").and_then(|v| v.as_f64()))
        .map(|f| f as i64)
        .collect();
    sequences.sort_unstable();

    for window in sequences.windows(2) {
        if window[1] - window[0] - 1 > 0 {
            let err = SequencingError::BookSequenceGap {
                market: market.to_string(),
                have: window[0],
                got: window[1],
            };
            warn!(error = %err, "reconstructor: sequence gap detected");
        }
    }

    let loss = gap_loss(&sequences);
    if loss > 0.0 {
        warn!(%market, loss, "reconstructor: non-zero gap loss over hard-refetch window");
    }
}

/// Finds the most recent `book_orders_last_check` row for `market`, reloads
/// the ladder `book_orders` wrote alongside it, and snapshots the
/// reconstructed book into `books`, replacing whatever the live replay path
/// had accumulated.
async fn hard_refetch_one(market: &str, store: &dyn PointStore, books: &OrderBookTable) {
    let now_ns = scheduler::now_ns();
    let lookback_ns = 3_600 * 1_000_000_000i64;

    let check_query = Query::new("book_orders_last_check", now_ns - lookback_ns, now_ns).tag("market", market);
    let last_check = match store.query(&check_query).await {
        Ok(rows) => rows.into_iter().max_by_key(|r| r.timestamp_ns),
        Err(err) => {
            error!(error = %err, %market, "reconstructor: book_orders_last_check query failed");
            return;
        }
    };
    let Some(last_check) = last_check else { return };

    let ladder_query = Query::new("book_orders", last_check.timestamp_ns, last_check.timestamp_ns + 1_000_000_000)
        .tag("market", market);
    let rows = match store.query(&ladder_query).await {
        Ok(rows) => rows,
        Err(err) => {
            error!(error = %err, %market, "reconstructor: book_orders query failed");
            return;
        }
    };

    let Some(book) = market_depth::order_book_from_rows(&rows) else { return };
    books.snapshot(market, book);
    info!(%market, "reconstructor: hard-refetch resynced book from the store");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Order, OrderType};

    fn book(sequence: i64) -> OrderBook {
        OrderBook::from_ladders(
            sequence,
            vec![Order { rate: 1.0, quantity: 2.0, order_type: OrderType::Bid }],
            vec![],
        )
    }

    #[test]
    fn property_5_repeat_sequence_is_a_no_op() {
        let table = OrderBookTable::new();
        table.snapshot("BTC_ETH", book(10));

        table.apply_bundle(
            "BTC_ETH",
            vec![BookUpdate { sequence: 11, order_type: OrderType::Bid, rate: 0.9, quantity: 1.0 }],
        );
        let after_first = table.get("BTC_ETH").unwrap();

        // Replaying the same sequence=11 update again must change nothing.
        table.apply_bundle(
            "BTC_ETH",
            vec![BookUpdate { sequence: 11, order_type: OrderType::Bid, rate: 0.9, quantity: 1.0 }],
        );
        let after_repeat = table.get("BTC_ETH").unwrap();

        assert_eq!(after_first.sequence, after_repeat.sequence);
        assert_eq!(after_first.bids.len(), after_repeat.bids.len());
    }

    #[test]
    fn out_of_order_updates_apply_in_sequence_order() {
        let table = OrderBookTable::new();
        table.snapshot("BTC_ETH", book(10));

        table.apply_bundle(
            "BTC_ETH",
            vec![
                BookUpdate { sequence: 12, order_type: OrderType::Bid, rate: 0.95, quantity: 3.0 },
                BookUpdate { sequence: 11, order_type: OrderType::Bid, rate: 1.0, quantity: 0.0 },
            ],
        );

        let updated = table.get("BTC_ETH").unwrap();
        assert_eq!(updated.sequence, 12);
        assert_eq!(updated.bids.len(), 2);
    }

    #[test]
    fn gap_loss_counts_every_missing_sequence_number() {
        assert_eq!(gap_loss(&[1, 2, 3]), 0.0);
        assert_eq!(gap_loss(&[1, 4]), 100.0 * 2.0 / 2.0);
    }

    #[tokio::test]
    async fn check_gap_loss_tolerates_a_market_with_no_book_updates() {
        let store = crate::store::memory::MemoryStore::new();
        // Should not panic even though nothing was ever written.
        check_gap_loss("BTC_ETH", &store, 0, 1_000_000_000).await;
    }

    #[tokio::test]
    async fn hard_refetch_one_reloads_the_book_from_the_persisted_ladder() {
        use crate::model::Point;

        let store = crate::store::memory::MemoryStore::new();
        let check_ts = crate::scheduler::now_ns() - 1_000_000_000;
        store
            .write_batch(&[
                Point::new("book_orders_last_check", check_ts)
                    .tag("market", "BTC_ETH")
                    .field("sequence", 42_i64)
                    .field("bid_depth", 1_i64)
                    .field("ask_depth", 1_i64),
                Point::new("book_orders", check_ts)
                    .tag("market", "BTC_ETH")
                    .tag("order_type", "bid")
                    .field("sequence", 42_i64)
                    .field("rate", 99.0)
                    .field("quantity", 10.0)
                    .field("total", 990.0)
                    .field("cumulative_sum", 990.0),
                Point::new("book_orders", check_ts + 1)
                    .tag("market", "BTC_ETH")
                    .tag("order_type", "ask")
                    .field("sequence", 42_i64)
                    .field("rate", 101.0)
                    .field("quantity", 5.0)
                    .field("total", 505.0)
                    .field("cumulative_sum", 505.0),
            ])
            .await
            .unwrap();

        let books = OrderBookTable::new();
        hard_refetch_one("BTC_ETH", &store, &books).await;

        let book = books.get("BTC_ETH").unwrap();
        assert_eq!(book.sequence, 42);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks.len(), 1);
    }
}
