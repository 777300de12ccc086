//! Market-history ingestion (4.D.ii): per-market trade tape pull, built on
//! the shared watermarking engine in `crate::market_history`.

use super::client::{BittrexPublicClient, RawMarketHistoryTrade};
use crate::batch::BatchSender;
use crate::error::DecodeError;
use crate::executor;
use crate::market_history::{self, HistoryTrade};
use crate::model::{BatchPoints, MarketTable, NewTrade, OrderType, Point};
use crate::numeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

fn parse_order_type(value: &serde_json::Value) -> Result<OrderType, DecodeError> {
    match numeric::to_str(value, "order_type", "bittrex market history")? {
        "BUY" | "buy" => Ok(OrderType::Bid),
        _ => Ok(OrderType::Ask),
    }
}

fn normalize_history_trade(raw: &RawMarketHistoryTrade) -> Result<HistoryTrade, DecodeError> {
    let id = numeric::to_i64(&raw.id, "id", "bittrex market history")?;
    let timestamp = numeric::to_i64(&raw.timestamp, "timestamp", "bittrex market history")?;
    let rate = numeric::to_f64(&raw.price, "price", "bittrex market history")?;
    let amount = numeric::to_f64(&raw.quantity, "quantity", "bittrex market history")?;
    let order_type = parse_order_type(&raw.order_type)?;

    Ok(HistoryTrade {
        id,
        trade: NewTrade { trade_id: id, date: timestamp, rate, amount, order_type },
    })
}

fn history_points(market: &str, trades: &[NewTrade]) -> Vec<Point> {
    trades
        .iter()
        .map(|t| {
            Point::new("market_histories", t.date * 1_000_000_000)
                .tag("source", "publicapi")
                .tag("market", market)
                .tag("order_type", t.order_type.as_str())
                .field("id", t.trade_id)
                .field("quantity", t.amount)
                .field("rate", t.rate)
                .field("total", t.total())
        })
        .collect()
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
            let markets = Arc::clone(&markets);
            let batch = batch.clone();
            tokio::spawn(ingest_one(public_client, market, period, markets, batch));
        }
        tokio::time::sleep(period).await;
    }
}

async fn ingest_one(
    public_client: Arc<dyn BittrexPublicClient>,
    market: String,
    period: Duration,
    markets: Arc<MarketTable>,
    batch: BatchSender,
) {
    let mut fetched: Option<Vec<RawMarketHistoryTrade>> = None;
    executor::execute_with_retry(period, "bittrex.markethistory.get_market_history", || {
        let public_client = Arc::clone(&public_client);
        let market = market.clone();
        let fetched_slot = &mut fetched;
        async move {
            let result = public_client.get_market_history(&market).await;
            if let Ok(trades) = &result {
                *fetched_slot = Some(trades.clone());
            }
            result.map(|_| ())
        }
    })
    .await;

    let Some(raw_trades) = fetched else { return };

    let mut history_trades = Vec::with_capacity(raw_trades.len());
    for raw in &raw_trades {
        match normalize_history_trade(raw) {
            Ok(t) => history_trades.push(t),
            Err(err) => error!(error = %err, %market, "bittrex markethistory: normalize_history_trade"),
        }
    }

    let result = market_history::process_market_history(markets.as_ref(), &market, &history_trades);
    if result.possibly_missing {
        warn!(%market, "bittrex markethistory: possibly missing trades");
    }
    if result.emitted.is_empty() {
        return;
    }

    let points = history_points(&market, &result.emitted);
    let _ = batch.send(BatchPoints::new("marketHistory", points)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trade(id: i64) -> RawMarketHistoryTrade {
        RawMarketHistoryTrade {
            id: json!(id),
            timestamp: json!(1_700_000_000),
            quantity: json!(1.0),
            price: json!(0.05),
            total: json!(0.05),
            fill_type: json!("FILL"),
            order_type: json!("BUY"),
        }
    }

    #[test]
    fn normalizes_a_trade_with_its_watermark_id() {
        let history = normalize_history_trade(&trade(42)).unwrap();
        assert_eq!(history.id, 42);
        assert_eq!(history.trade.order_type, OrderType::Bid);
    }
}
