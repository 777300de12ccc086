//! Market push ingestion (4.D.iv): order-book deltas and real-time trades
//! arriving together on one per-market push channel, plus the discovery
//! loop that opens a channel for every newly listed market.
//!
//! A `NewTrade` update is written to the same `trades` measurement the
//! missing-trade reconciler scans for gaps, carrying `trade_id` so that
//! scan actually has something to key on -- the push feed is this crate's
//! only source of live trade ids, so it is the one that must record them.

use super::client::{MarketUpdate, MarketUpdateBundle, PoloniexPushClient};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::model::{BatchPoints, Point};
use crate::numeric;
use crate::reconstructor::OrderBookTable;
use crate::subscription::SubscriptionTable;
use std::sync::Arc;
use tracing::{error, info};

pub fn normalize_market_update(
    update: &MarketUpdate,
    market: &str,
    sequence: i64,
    now_ns: i64,
) -> Result<Point, DecodeError> {
    match update {
        MarketUpdate::OrderBookModify { order_type, rate, amount } => {
            let order_type = numeric::to_str(order_type, "order_type", "poloniex book update")?;
            Ok(Point::new("book_updates", now_ns)
                .tag("source", "pushapi")
                .tag("order_type", order_type)
                .tag("market", market)
                .field("sequence", sequence)
                .field("rate", numeric::to_f64(rate, "rate", "poloniex book update")?)
                .field("amount", numeric::to_f64(amount, "amount", "poloniex book update")?))
        }
        MarketUpdate::OrderBookRemove { order_type, rate } => {
            let order_type = numeric::to_str(order_type, "order_type", "poloniex book update")?;
            Ok(Point::new("book_updates", now_ns)
                .tag("source", "pushapi")
                .tag("order_type", order_type)
                .tag("market", market)
                .field("sequence", sequence)
                .field("rate", numeric::to_f64(rate, "rate", "poloniex book update")?)
                .field("amount", 0.0_f64))
        }
        MarketUpdate::NewTrade { order_type, rate, amount, date, trade_id } => {
            let order_type = numeric::to_str(order_type, "order_type", "poloniex new trade")?;
            let date = numeric::to_i64(date, "date", "poloniex new trade")?;
            let trade_id = numeric::to_i64(trade_id, "trade_id", "poloniex new trade")?;
            let nano = now_ns.rem_euclid(1_000_000_000);
            Ok(Point::new("trades", date * 1_000_000_000 + nano)
                .tag("source", "pushapi")
                .tag("order_type", order_type)
                .tag("market", market)
                .field("sequence", sequence)
                .field("trade_id", trade_id)
                .field("rate", numeric::to_f64(rate, "rate", "poloniex new trade")?)
                .field("amount", numeric::to_f64(amount, "amount", "poloniex new trade")?))
        }
    }
}

fn normalize_bundle(bundle: &MarketUpdateBundle, market: &str, now_ns: i64) -> Result<Vec<Point>, DecodeError> {
    let sequence = numeric::to_i64(&bundle.sequence, "sequence", "poloniex market update bundle")?;
    bundle
        .updates
        .iter()
        .map(|u| normalize_market_update(u, market, sequence, now_ns))
        .collect()
}

async fn run_market_worker(
    mut receiver: tokio::sync::mpsc::Receiver<MarketUpdateBundle>,
    market: String,
    books: Arc<OrderBookTable>,
    batch: BatchSender,
) {
    while let Some(bundle) = receiver.recv().await {
        let now_ns = crate::scheduler::now_ns();
        match normalize_bundle(&bundle, &market, now_ns) {
            Ok(points) => {
                let _ = batch.send(BatchPoints::new("markets", points)).await;
            }
            Err(err) => {
                error!(error = %err, %market, "poloniex market: normalize_bundle");
                continue;
            }
        }

        // Book-shaped updates also replay against the reconstructed book so
        // depth/gap-loss tracking stays in sync with the push feed.
        let book_updates: Vec<crate::model::BookUpdate> = bundle
            .updates
            .iter()
            .filter_map(|u| to_book_update(u, &bundle.sequence))
            .collect();
        if !book_updates.is_empty() {
            books.apply_bundle(&market, book_updates);
        }
    }
}

fn to_book_update(update: &MarketUpdate, sequence: &serde_json::Value) -> Option<crate::model::BookUpdate> {
    let sequence = numeric::to_i64(sequence, "sequence", "poloniex book update").ok()?;
    match update {
        MarketUpdate::OrderBookModify { order_type, rate, amount } => Some(crate::model::BookUpdate {
            sequence,
            order_type: parse_order_type(order_type)?,
            rate: numeric::to_f64(rate, "rate", "poloniex book update").ok()?,
            quantity: numeric::to_f64(amount, "amount", "poloniex book update").ok()?,
        }),
        MarketUpdate::OrderBookRemove { order_type, rate } => Some(crate::model::BookUpdate {
            sequence,
            order_type: parse_order_type(order_type)?,
            rate: numeric::to_f64(rate, "rate", "poloniex book update").ok()?,
            quantity: 0.0,
        }),
        MarketUpdate::NewTrade { .. } => None,
    }
}

fn parse_order_type(value: &serde_json::Value) -> Option<crate::model::OrderType> {
    match value.as_str()? {
        "bid" => Some(crate::model::OrderType::Bid),
        "ask" => Some(crate::model::OrderType::Ask),
        _ => None,
    }
}

/// Discovers markets with no worker yet and spawns one push-consuming task
/// per market (subscription manager invariant: at most one worker/market).
pub async fn discover_and_subscribe(
    push_client: Arc<dyn PoloniexPushClient>,
    all_markets: &[String],
    subscriptions: &SubscriptionTable,
    books: Arc<OrderBookTable>,
    batch: BatchSender,
) {
    let new_markets = subscriptions.unsubscribed_markets(all_markets);
    if new_markets.is_empty() {
        return;
    }
    info!(count = new_markets.len(), "poloniex market: discovered new markets");

    for market in new_markets {
        let receiver = match push_client.subscribe_market(&market).await {
            Ok(r) => r,
            Err(err) => {
                error!(error = %err, %market, "poloniex market: subscribe_market");
                continue;
            }
        };

        let books = Arc::clone(&books);
        let batch = batch.clone();
        let market_name = market.clone();
        let handle = tokio::spawn(run_market_worker(receiver, market_name, books, batch));
        subscriptions.insert(market, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_order_book_modify() {
        let update = MarketUpdate::OrderBookModify {
            order_type: json!("bid"),
            rate: json!(0.05),
            amount: json!(12.0),
        };
        let point = normalize_market_update(&update, "BTC_ETH", 99, 1_000).unwrap();
        assert_eq!(point.measurement, "book_updates");
        assert_eq!(point.fields.get("amount").unwrap().as_f64(), Some(12.0));
    }

    #[test]
    fn normalizes_order_book_remove_as_zero_amount() {
        let update = MarketUpdate::OrderBookRemove { order_type: json!("ask"), rate: json!(0.06) };
        let point = normalize_market_update(&update, "BTC_ETH", 99, 1_000).unwrap();
        assert_eq!(point.fields.get("amount").unwrap().as_f64(), Some(0.0));
    }

    #[test]
    fn normalizes_new_trade_with_trade_id_and_date_based_timestamp() {
        let update = MarketUpdate::NewTrade {
            order_type: json!("bid"),
            rate: json!(0.05),
            amount: json!(1.0),
            date: json!(1_700_000_000),
            trade_id: json!(555),
        };
        let point = normalize_market_update(&update, "BTC_ETH", 99, 123_456_789).unwrap();
        assert_eq!(point.measurement, "trades");
        assert_eq!(point.fields.get("trade_id").unwrap().as_f64(), Some(555.0));
        assert_eq!(point.timestamp_ns, 1_700_000_000 * 1_000_000_000 + 123_456_789);
    }
}
