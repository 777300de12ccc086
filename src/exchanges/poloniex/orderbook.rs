//! Order-book snapshot ingestion (4.D.iii): periodic REST pull of every
//! market's full book, used both to seed/hard-refetch the reconstructor
//! and to record a raw depth snapshot in the store.

use super::client::{PoloniexPublicClient, RawOrder, RawOrderBook};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::executor;
use crate::model::{BatchPoints, Order, OrderBook, OrderType, Point};
use crate::numeric;
use crate::reconstructor::OrderBookTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

fn normalize_orders(raw: &[RawOrder], order_type: OrderType) -> Result<Vec<Order>, DecodeError> {
    raw.iter()
        .map(|o| {
            Ok(Order {
                rate: numeric::to_f64(&o.rate, "rate", "poloniex order book")?,
                quantity: numeric::to_f64(&o.quantity, "quantity", "poloniex order book")?,
                order_type,
            })
        })
        .collect()
}

pub fn normalize_order_book(raw: &RawOrderBook) -> Result<OrderBook, DecodeError> {
    let sequence = numeric::to_i64(&raw.sequence, "sequence", "poloniex order book")?;
    let bids = normalize_orders(&raw.bids, OrderType::Bid)?;
    let asks = normalize_orders(&raw.asks, OrderType::Ask)?;
    Ok(OrderBook::from_ladders(sequence, bids, asks))
}

/// One point per price level, ask levels first then bid levels, each given
/// a distinct sub-second timestamp (`base_timestamp_sec`, index-as-ns) so
/// no two levels of the same snapshot collide on write. `rate`/`quantity`/
/// `total`/`cumulative_sum` come straight off the already-sorted `OrderBook`
/// (`OrderBook::from_ladders` computes the running sum top-outward per
/// side), matching the ladder schema the reconstructor's hard-refetch reads
/// back from the store.
pub fn order_book_points(market: &str, book: &OrderBook, base_timestamp_sec: i64) -> Vec<Point> {
    let mut points = Vec::with_capacity(book.asks.len() + book.bids.len());
    let mut index: i64 = 0;

    let mut push_side = |levels: &[crate::model::OrderLevel], label: &str, points: &mut Vec<Point>| {
        for level in levels {
            let timestamp_ns = base_timestamp_sec * 1_000_000_000 + index;
            index += 1;
            points.push(
                Point::new("book_orders", timestamp_ns)
                    .tag("source", "publicapi")
                    .tag("order_type", label)
                    .tag("market", market)
                    .field("sequence", book.sequence)
                    .field("rate", level.rate)
                    .field("quantity", level.quantity)
                    .field("total", level.total)
                    .field("cumulative_sum", level.cumulative_sum),
            );
        }
    };

    push_side(&book.asks, "ask", &mut points);
    push_side(&book.bids, "bid", &mut points);
    points
}

pub fn last_order_book_check_point(market: &str, book: &OrderBook, timestamp_ns: i64) -> Point {
    Point::new("book_orders_last_check", timestamp_ns)
        .tag("source", "publicapi")
        .tag("market", market)
        .field("sequence", book.sequence)
        .field("bid_depth", book.bids.len() as i64)
        .field("ask_depth", book.asks.len() as i64)
}

/// Pulls every market's book every `period`, retrying each failed request
/// with the request-executor's retry-until-deadline policy, then reseeds
/// the reconstructor's table and emits both the snapshot points and the
/// last-check point.
pub async fn run(
    public_client: Arc<dyn PoloniexPublicClient>,
    depth: usize,
    period: Duration,
    books: Arc<OrderBookTable>,
    batch: BatchSender,
) {
    loop {
        let mut fetched: Option<HashMap<String, RawOrderBook>> = None;
        executor::execute_with_retry(period, "poloniex.orderbook.get_order_books", || {
            let public_client = Arc::clone(&public_client);
            let fetched_slot = &mut fetched;
            async move {
                let result = public_client.get_order_books(depth).await;
                if let Ok(books) = &result {
                    *fetched_slot = Some(books.clone());
                }
                result.map(|_| ())
            }
        })
        .await;

        if let Some(raw_books) = fetched {
            let base_timestamp_sec = crate::scheduler::now_ns() / 1_000_000_000;
            for (market, raw_book) in raw_books {
                let book = match normalize_order_book(&raw_book) {
                    Ok(b) => b,
                    Err(err) => {
                        error!(error = %err, %market, "poloniex orderbook: normalize_order_book");
                        continue;
                    }
                };

                let snapshot_points = order_book_points(&market, &book, base_timestamp_sec);
                let check_point =
                    last_order_book_check_point(&market, &book, base_timestamp_sec * 1_000_000_000);

                books.snapshot(&market, book);

                let _ = batch.send(BatchPoints::new("orderBook", snapshot_points)).await;
                let _ = batch.send(BatchPoints::new("orderBookLastCheck", vec![check_point])).await;
            }
        }

        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_book() -> RawOrderBook {
        RawOrderBook {
            sequence: json!(42),
            asks: vec![RawOrder { rate: json!(1.1), quantity: json!(2.0) }],
            bids: vec![RawOrder { rate: json!(1.0), quantity: json!(3.0) }],
        }
    }

    #[test]
    fn normalizes_sequence_and_both_sides() {
        let book = normalize_order_book(&raw_book()).unwrap();
        assert_eq!(book.sequence, 42);
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.bids.len(), 1);
    }

    #[test]
    fn snapshot_points_cover_every_level_with_distinct_timestamps() {
        let book = normalize_order_book(&raw_book()).unwrap();
        let points = order_book_points("BTC_ETH", &book, 1_700_000_000);
        assert_eq!(points.len(), 2);
        assert_ne!(points[0].timestamp_ns, points[1].timestamp_ns);
        assert!(points.iter().all(|p| p.tags.get("market").unwrap() == "BTC_ETH"));
        assert!(points.iter().all(|p| p.measurement == "book_orders"));
        assert!(points.iter().all(|p| p.fields.contains_key("cumulative_sum")));
    }

    #[test]
    fn last_check_point_reports_sequence_and_both_side_depths() {
        let book = normalize_order_book(&raw_book()).unwrap();
        let point = last_order_book_check_point("BTC_ETH", &book, 0);
        assert_eq!(point.measurement, "book_orders_last_check");
        assert_eq!(point.fields.get("sequence").unwrap().as_f64(), Some(42.0));
        assert_eq!(point.fields.get("bid_depth").unwrap().as_f64(), Some(1.0));
        assert_eq!(point.fields.get("ask_depth").unwrap().as_f64(), Some(1.0));
    }
}
