//! Order-book snapshot ingestion (4.D.iii, Bittrex variant): per-market
//! REST pull, no sequence number -- Bittrex's book endpoint is a flat
//! snapshot, so there is no incremental reconstructor to feed, only a
//! depth-over-time record.

use super::client::{BittrexPublicClient, RawOrder, RawOrderBook};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::executor;
use crate::model::{BatchPoints, MarketTable, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

struct NormalizedLevel {
    rate: f64,
    quantity: f64,
}

fn normalize_side(raw: &[RawOrder]) -> Result<Vec<NormalizedLevel>, DecodeError> {
    raw.iter()
        .map(|o| {
            Ok(NormalizedLevel {
                rate: numeric::to_f64(&o.rate, "rate", "bittrex order book")?,
                quantity: numeric::to_f64(&o.quantity, "quantity", "bittrex order book")?,
            })
        })
        .collect()
}

pub fn order_book_points(market: &str, book: &RawOrderBook, base_timestamp_sec: i64) -> Result<Vec<Point>, DecodeError> {
    let asks = normalize_side(&book.sell)?;
    let bids = normalize_side(&book.buy)?;
    let mut points = Vec::with_capacity(asks.len() + bids.len());
    let mut index: i64 = 0;

    let mut push_side = |levels: &[NormalizedLevel], label: &str, points: &mut Vec<Point>| {
        let mut cumulative_sum = 0.0;
        for level in levels {
            let total = level.rate * level.quantity;
            cumulative_sum += total;
            let timestamp_ns = base_timestamp_sec * 1_000_000_000 + index;
            index += 1;
            points.push(
                Point::new("book_orders", timestamp_ns)
                    .tag("source", "publicapi")
                    .tag("order_type", label)
                    .tag("market", market)
                    .field("rate", level.rate)
                    .field("quantity", level.quantity)
                    .field("total", total)
                    .field("cumulative_sum", cumulative_sum),
            );
        }
    };

    push_side(&asks, "ask", &mut points);
    push_side(&bids, "bid", &mut points);
    Ok(points)
}

pub fn last_check_point(market: &str, book: &RawOrderBook, timestamp_ns: i64) -> Point {
    Point::new("book_orders_last_check", timestamp_ns)
        .tag("source", "publicapi")
        .tag("market", market)
        .field("bid_depth", book.buy.len() as i64)
        .field("ask_depth", book.sell.len() as i64)
}

pub async fn run(
    public_client: Arc<dyn BittrexPublicClient>,
    period: Duration,
    markets: Arc<MarketTable>,
    batch: BatchSender,
) {
    loop {
        for market in markets.active_markets() {
            let public_client = Arc::clone(&public_client);
            let batch = batch.clone();
            tokio::spawn(ingest_one(public_client, market, period, batch));
        }
        tokio::time::sleep(period).await;
    }
}

async fn ingest_one(public_client: Arc<dyn BittrexPublicClient>, market: String, period: Duration, batch: BatchSender) {
    let mut fetched: Option<RawOrderBook> = None;
    executor::execute_with_retry(period, "bittrex.orderbook.get_order_book", || {
        let public_client = Arc::clone(&public_client);
        let market = market.clone();
        let fetched_slot = &mut fetched;
        async move {
            let result = public_client.get_order_book(&market).await;
            if let Ok(book) = &result {
                *fetched_slot = Some(book.clone());
            }
            result.map(|_| ())
        }
    })
    .await;

    let Some(book) = fetched else { return };
    let base_timestamp_sec = crate::scheduler::now_ns() / 1_000_000_000;

    match order_book_points(&market, &book, base_timestamp_sec) {
        Ok(points) => {
            let _ = batch.send(BatchPoints::new("orderBook", points)).await;
            let check = last_check_point(&market, &book, base_timestamp_sec * 1_000_000_000);
            let _ = batch.send(BatchPoints::new("orderBookLastCheck", vec![check])).await;
        }
        Err(err) => error!(error = %err, %market, "bittrex orderbook: order_book_points"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book() -> RawOrderBook {
        RawOrderBook {
            buy: vec![RawOrder { rate: json!(1.0), quantity: json!(2.0) }, RawOrder { rate: json!(0.9), quantity: json!(1.0) }],
            sell: vec![RawOrder { rate: json!(1.1), quantity: json!(3.0) }],
        }
    }

    #[test]
    fn accumulates_cumulative_sum_per_side() {
        let points = order_book_points("BTC-ETH", &book(), 1_700_000_000).unwrap();
        let bid_points: Vec<_> = points.iter().filter(|p| p.tags.get("order_type").unwrap() == "bid").collect();
        assert_eq!(bid_points[0].fields.get("cumulative_sum").unwrap().as_f64(), Some(2.0));
        assert_eq!(bid_points[1].fields.get("cumulative_sum").unwrap().as_f64(), Some(2.9));
    }

    #[test]
    fn last_check_point_records_both_side_depths() {
        let point = last_check_point("BTC-ETH", &book(), 0);
        assert_eq!(point.fields.get("bid_depth").unwrap().as_f64(), Some(2.0));
        assert_eq!(point.fields.get("ask_depth").unwrap().as_f64(), Some(1.0));
    }
}
