//! Tick ingestion (4.D.i, pull variant): one REST call covering every
//! listed asset, polled on a period measured in minutes.

use super::client::{CoinMarketCapClient, RawTick};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::model::{BatchPoints, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub fn normalize_tick(tick: &RawTick) -> Result<Point, DecodeError> {
    let last_updated = numeric::to_i64(&tick.last_updated, "last_updated", "coinmarketcap tick")?;
    let symbol = numeric::to_str(&tick.symbol, "symbol", "coinmarketcap tick")?;
    let name = numeric::to_str(&tick.name, "name", "coinmarketcap tick")?;
    let id = numeric::to_str(&tick.id, "id", "coinmarketcap tick")?;

    Ok(Point::new("ticks", last_updated * 1_000_000_000)
        .tag("source", "coinmarketcap")
        .tag("symbol", symbol)
        .tag("id", id)
        .tag("name", name)
        .field("rank", numeric::to_i64(&tick.rank, "rank", "coinmarketcap tick")?)
        .field("price_usd", numeric::to_f64(&tick.price_usd, "price_usd", "coinmarketcap tick")?)
        .field("price_btc", numeric::to_f64(&tick.price_btc, "price_btc", "coinmarketcap tick")?)
        .field(
            "day_volume_usd",
            numeric::to_f64(&tick.day_volume_usd, "day_volume_usd", "coinmarketcap tick")?,
        )
        .field(
            "market_cap_usd",
            numeric::to_f64(&tick.market_cap_usd, "market_cap_usd", "coinmarketcap tick")?,
        )
        .field(
            "available_supply",
            numeric::to_f64(&tick.available_supply, "available_supply", "coinmarketcap tick")?,
        )
        .field(
            "total_supply",
            numeric::to_f64(&tick.total_supply, "total_supply", "coinmarketcap tick")?,
        )
        .field(
            "percent_change_1h",
            numeric::to_f64(&tick.percent_change_1h, "percent_change_1h", "coinmarketcap tick")?,
        )
        .field(
            "percent_change_24h",
            numeric::to_f64(&tick.percent_change_24h, "percent_change_24h", "coinmarketcap tick")?,
        )
        .field(
            "percent_change_7d",
            numeric::to_f64(&tick.percent_change_7d, "percent_change_7d", "coinmarketcap tick")?,
        ))
}

pub async fn run(client: Arc<dyn CoinMarketCapClient>, period: Duration, batch: BatchSender) {
    loop {
        match client.get_tickers().await {
            Ok(ticks) => {
                let mut points = Vec::with_capacity(ticks.len());
                for tick in &ticks {
                    match normalize_tick(tick) {
                        Ok(p) => points.push(p),
                        Err(err) => error!(error = %err, "coinmarketcap ticker: normalize_tick"),
                    }
                }
                let _ = batch.send(BatchPoints::new("ticks", points)).await;
            }
            Err(err) => {
                error!(error = %err, "coinmarketcap ticker: get_tickers");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        }
        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RawTick {
        RawTick {
            id: json!("bitcoin"),
            name: json!("Bitcoin"),
            symbol: json!("BTC"),
            rank: json!(1),
            price_usd: json!("35000.12"),
            price_btc: json!(1.0),
            day_volume_usd: json!(2.0e10),
            market_cap_usd: json!(6.5e11),
            available_supply: json!(19_000_000.0),
            total_supply: json!(21_000_000.0),
            percent_change_1h: json!(0.1),
            percent_change_24h: json!(1.2),
            percent_change_7d: json!(-3.4),
            last_updated: json!(1_700_000_000),
        }
    }

    #[test]
    fn normalizes_a_tick_with_string_encoded_price() {
        let point = normalize_tick(&sample()).unwrap();
        assert_eq!(point.fields.get("price_usd").unwrap().as_f64(), Some(35000.12));
        assert_eq!(point.tags.get("symbol").unwrap(), "BTC");
    }
}
