//! Market-summary ingestion (4.D.i, pull variant): one REST call covering
//! every market, polled on a fixed period.

use super::client::{BittrexPublicClient, RawMarketSummary};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::executor;
use crate::model::{BatchPoints, MarketTable, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub fn normalize_market_summary(summary: &RawMarketSummary, _now_ns: i64) -> Result<Point, DecodeError> {
    let timestamp = numeric::to_i64(&summary.timestamp, "timestamp", "bittrex market summary")?;
    let created = numeric::to_str(&summary.created, "created", "bittrex market summary")?;

    Ok(Point::new("market_summaries", timestamp * 1_000_000_000)
        .tag("source", "publicapi")
        .tag("market", summary.market_name.as_str())
        .tag("created", created)
        .field("high", numeric::to_f64(&summary.high, "high", "bittrex market summary")?)
        .field("low", numeric::to_f64(&summary.low, "low", "bittrex market summary")?)
        .field("volume", numeric::to_f64(&summary.volume, "volume", "bittrex market summary")?)
        .field("last", numeric::to_f64(&summary.last, "last", "bittrex market summary")?)
        .field(
            "base_volume",
            numeric::to_f64(&summary.base_volume, "base_volume", "bittrex market summary")?,
        )
        .field("timestamp", timestamp)
        .field("bid", numeric::to_f64(&summary.bid, "bid", "bittrex market summary")?)
        .field("ask", numeric::to_f64(&summary.ask, "ask", "bittrex market summary")?)
        .field(
            "open_buy_orders",
            numeric::to_i64(&summary.open_buy_orders, "open_buy_orders", "bittrex market summary")?,
        )
        .field(
            "open_sell_orders",
            numeric::to_i64(&summary.open_sell_orders, "open_sell_orders", "bittrex market summary")?,
        )
        .field(
            "prev_day",
            numeric::to_f64(&summary.prev_day, "prev_day", "bittrex market summary")?,
        ))
}

/// Polls every market summary on `period`, retrying failed requests under
/// the request executor's retry-until-deadline policy. This endpoint
/// covers every listed market, so it doubles as Bittrex's market
/// discovery source: every summary upserts its market into `markets`.
pub async fn run(
    public_client: Arc<dyn BittrexPublicClient>,
    period: Duration,
    markets: Arc<MarketTable>,
    batch: BatchSender,
) {
    loop {
        let mut fetched: Option<Vec<RawMarketSummary>> = None;
        executor::execute_with_retry(period, "bittrex.marketsummary.get_market_summaries", || {
            let public_client = Arc::clone(&public_client);
            let fetched_slot = &mut fetched;
            async move {
                let result = public_client.get_market_summaries().await;
                if let Ok(summaries) = &result {
                    *fetched_slot = Some(summaries.clone());
                }
                result.map(|_| ())
            }
        })
        .await;

        if let Some(summaries) = fetched {
            let now_ns = crate::scheduler::now_ns();
            let mut points = Vec::with_capacity(summaries.len());
            for summary in &summaries {
                markets.upsert(&summary.market_name, true);
                match normalize_market_summary(summary, now_ns) {
                    Ok(p) => points.push(p),
                    Err(err) => error!(error = %err, market = %summary.market_name, "bittrex marketsummary: normalize"),
                }
            }
            let _ = batch.send(BatchPoints::new("marketSummary", points)).await;
        }

        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RawMarketSummary {
        RawMarketSummary {
            market_name: "BTC-ETH".to_string(),
            high: json!(0.06),
            low: json!(0.04),
            volume: json!(1000.0),
            last: json!(0.05),
            base_volume: json!(50.0),
            timestamp: json!(1_700_000_000),
            bid: json!(0.049),
            ask: json!(0.051),
            open_buy_orders: json!(10),
            open_sell_orders: json!(5),
            prev_day: json!(0.048),
            created: json!("2023-11-14T22:13:20"),
        }
    }

    #[test]
    fn normalizes_a_market_summary_at_its_reported_timestamp() {
        let point = normalize_market_summary(&sample(), 0).unwrap();
        assert_eq!(point.timestamp_ns, 1_700_000_000 * 1_000_000_000);
        assert_eq!(point.fields.get("last").unwrap().as_f64(), Some(0.05));
        assert_eq!(point.fields.get("open_buy_orders").unwrap().as_f64(), Some(10.0));
    }
}
