//! Ticker ingestion (4.D.i, push variant): one subscription for the whole
//! exchange, fanning out one `Point` per tick as it arrives.

use super::client::{PoloniexPushClient, RawTick};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::model::{BatchPoints, MarketTable, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub fn normalize_tick(tick: &RawTick, now_ns: i64) -> Result<Point, DecodeError> {
    let is_frozen = numeric::to_i64(&tick.is_frozen, "is_frozen", "poloniex tick")? != 0;

    Ok(Point::new("ticks", now_ns)
        .tag("market", tick.currency_pair.as_str())
        .field("last", numeric::to_f64(&tick.last, "last", "poloniex tick")?)
        .field(
            "lowest_ask",
            numeric::to_f64(&tick.lowest_ask, "lowest_ask", "poloniex tick")?,
        )
        .field(
            "highest_bid",
            numeric::to_f64(&tick.highest_bid, "highest_bid", "poloniex tick")?,
        )
        .field(
            "percent_change",
            numeric::to_f64(&tick.percent_change, "percent_change", "poloniex tick")?,
        )
        .field(
            "base_volume",
            numeric::to_f64(&tick.base_volume, "base_volume", "poloniex tick")?,
        )
        .field(
            "quote_volume",
            numeric::to_f64(&tick.quote_volume, "quote_volume", "poloniex tick")?,
        )
        .field("is_frozen", is_frozen)
        .field(
            "high_24hr",
            numeric::to_f64(&tick.high_24hr, "high_24hr", "poloniex tick")?,
        )
        .field(
            "low_24hr",
            numeric::to_f64(&tick.low_24hr, "low_24hr", "poloniex tick")?,
        ))
}

/// Subscribes to the ticker push feed, retrying every 5s until it succeeds
/// (no deadline -- a one-shot subscription, not a periodic poll), then
/// forwards one single-point batch per tick for as long as the
/// subscription stays open. Every tick also upserts its market into
/// `markets` as active -- the ticker stream is this exchange's market
/// discovery source, since it covers every listed pair.
pub async fn run(push_client: Arc<dyn PoloniexPushClient>, markets: Arc<MarketTable>, batch: BatchSender) {
    let mut receiver = loop {
        match push_client.subscribe_ticker().await {
            Ok(r) => break r,
            Err(err) => {
                error!(error = %err, "poloniex ticks: subscribe_ticker");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    };

    while let Some(tick) = receiver.recv().await {
        markets.upsert(&tick.currency_pair, true);
        let now_ns = crate::scheduler::now_ns();
        match normalize_tick(&tick, now_ns) {
            Ok(point) => {
                let _ = batch.send(BatchPoints::new("ticks", vec![point])).await;
            }
            Err(err) => error!(error = %err, market = %tick.currency_pair, "poloniex ticks: normalize_tick"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tick() -> RawTick {
        RawTick {
            currency_pair: "BTC_ETH".to_string(),
            last: json!("0.05"),
            lowest_ask: json!(0.051),
            highest_bid: json!(0.049),
            percent_change: json!(0.01),
            base_volume: json!(120.5),
            quote_volume: json!(2400.0),
            is_frozen: json!(0),
            high_24hr: json!(0.06),
            low_24hr: json!(0.04),
        }
    }

    #[test]
    fn normalizes_a_tick_including_string_encoded_numbers() {
        let point = normalize_tick(&sample_tick(), 1_000).unwrap();
        assert_eq!(point.tags.get("market").unwrap(), "BTC_ETH");
        assert_eq!(point.fields.get("last").unwrap().as_f64(), Some(0.05));
        assert_eq!(point.fields.get("is_frozen"), Some(&crate::model::FieldValue::Bool(false)));
    }

    #[test]
    fn rejects_a_non_numeric_field() {
        let mut tick = sample_tick();
        tick.last = json!("not a number");
        assert!(normalize_tick(&tick, 1_000).is_err());
    }
}
