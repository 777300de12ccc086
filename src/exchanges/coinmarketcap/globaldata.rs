//! Global-data ingestion: a single tagless snapshot row, polled on a
//! period measured in minutes.

use super::client::{CoinMarketCapClient, RawGlobalData};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::model::{BatchPoints, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub fn normalize_global_data(data: &RawGlobalData, now_ns: i64) -> Result<Point, DecodeError> {
    Ok(Point::new("global_data", now_ns)
        .field(
            "total_market_cap_usd",
            numeric::to_f64(&data.total_market_cap_usd, "total_market_cap_usd", "coinmarketcap global data")?,
        )
        .field(
            "total_24h_volume_usd",
            numeric::to_f64(&data.total_24h_volume_usd, "total_24h_volume_usd", "coinmarketcap global data")?,
        )
        .field(
            "bitcoin_percentage_of_market_cap",
            numeric::to_f64(
                &data.bitcoin_percentage_of_market_cap,
                "bitcoin_percentage_of_market_cap",
                "coinmarketcap global data",
            )?,
        )
        .field(
            "active_currencies",
            numeric::to_i64(&data.active_currencies, "active_currencies", "coinmarketcap global data")?,
        )
        .field(
            "active_assets",
            numeric::to_i64(&data.active_assets, "active_assets", "coinmarketcap global data")?,
        )
        .field(
            "active_markets",
            numeric::to_i64(&data.active_markets, "active_markets", "coinmarketcap global data")?,
        ))
}

pub async fn run(client: Arc<dyn CoinMarketCapClient>, period: Duration, batch: BatchSender) {
    loop {
        match client.get_global_data().await {
            Ok(data) => {
                let now_ns = crate::scheduler::now_ns();
                match normalize_global_data(&data, now_ns) {
                    Ok(point) => {
                        let _ = batch.send(BatchPoints::new("globalData", vec![point])).await;
                    }
                    Err(err) => error!(error = %err, "coinmarketcap globaldata: normalize_global_data"),
                }
            }
            Err(err) => {
                error!(error = %err, "coinmarketcap globaldata: get_global_data");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        }
        tokio::time::sleep(period).await;
    }
}
