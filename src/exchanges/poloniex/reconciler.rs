//! Missing-Trade Reconciler orchestration (4.G): scans the store for
//! arithmetic gaps in the ingested `trade_id` sequence and refetches the
//! missing range from Poloniex's public trade-history endpoint.
//!
//! The pure detection/merge logic lives in `crate::reconciler`; this module
//! is only the store query, the collaborator call, and the retry around it,
//! the same split `markethistory.rs` uses on the Bittrex side.

use super::client::{PoloniexPublicClient, RawTradeHistoryEntry};
use crate::batch::BatchSender;
use crate::error::{DecodeError, SequencingError};
use crate::model::{BatchPoints, MarketTable, NewTrade, OrderType};
use crate::numeric;
use crate::reconciler;
use crate::scheduler;
use crate::store::{PointStore, Query};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

fn parse_order_type(value: &serde_json::Value) -> Result<OrderType, DecodeError> {
    match numeric::to_str(value, "type", "poloniex trade history")? {
        "buy" => Ok(OrderType::Bid),
        _ => Ok(OrderType::Ask),
    }
}

fn normalize_trade(raw: &RawTradeHistoryEntry) -> Result<NewTrade, DecodeError> {
    Ok(NewTrade {
        trade_id: numeric::to_i64(&raw.trade_id, "trade_id", "poloniex trade history")?,
        date: numeric::to_i64(&raw.date, "date", "poloniex trade history")?,
        rate: numeric::to_f64(&raw.rate, "rate", "poloniex trade history")?,
        amount: numeric::to_f64(&raw.amount, "amount", "poloniex trade history")?,
        order_type: parse_order_type(&raw.order_type)?,
    })
}

/// Ticks on `period`: queries the store's `trades` measurement for every
/// active market's `trade_id`s over the trailing `2*period` window, detects
/// gaps per market, and for each gap refetches and re-emits the missing
/// trades tagged `missingTrade`.
pub async fn run(
    public_client: Arc<dyn PoloniexPublicClient>,
    period: Duration,
    markets: Arc<MarketTable>,
    store: Arc<dyn PointStore>,
    batch: BatchSender,
) {
    loop {
        let now_ns = scheduler::now_ns();
        let from_ns = now_ns - 2 * period.as_nanos() as i64;

        let mut trade_ids_by_market: HashMap<String, Vec<i64>> = HashMap::new();
        for market in markets.active_markets() {
            let query = Query::new("trades", from_ns, now_ns).tag("market", market.as_str());
            match store.query(&query).await {
                Ok(rows) => {
                    let mut ids: Vec<i64> = rows
                        .iter()
                        .filter_map(|r| r.fields.get("trade_id").and_then(|v| v.as_f64()))
                        .map(|f| f as i64)
                        .collect();
                    ids.sort_unstable();
                    trade_ids_by_market.insert(market, ids);
                }
                Err(err) => error!(error = %err, %market, "poloniex reconciler: trades query failed"),
            }
        }

        let gaps = reconciler::missing_trade_ids_by_market(&trade_ids_by_market);
        let start_sec = from_ns / 1_000_000_000;
        let end_sec = now_ns / 1_000_000_000;

        for (market, missing) in gaps {
            let (from, to) = match (missing.iter().min(), missing.iter().max()) {
                (Some(&a), Some(&b)) => (a, b + 1),
                _ => continue,
            };
            let gap_err = SequencingError::TradeIdGap { market: market.clone(), from, to };
            warn!(error = %gap_err, "poloniex reconciler: trade id gap detected");

            let fetched = match public_client.get_trade_history(&market, start_sec, end_sec).await {
                Ok(entries) => entries,
                Err(err) => {
                    error!(error = %err, %market, "poloniex reconciler: get_trade_history failed");
                    continue;
                }
            };

            let mut trades = Vec::with_capacity(fetched.len());
            for raw in &fetched {
                match normalize_trade(raw) {
                    Ok(t) => trades.push(t),
                    Err(err) => error!(error = %err, %market, "poloniex reconciler: normalize_trade"),
                }
            }

            let reconciled = reconciler::filter_missing_trades(&trades, &missing);
            if reconciled.is_empty() {
                continue;
            }
            let points = reconciler::missing_trade_points(&market, &reconciled);
            let _ = batch.send(BatchPoints::new("missingTrade", points)).await;
        }

        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: i64, kind: &str) -> RawTradeHistoryEntry {
        RawTradeHistoryEntry {
            trade_id: json!(id),
            date: json!(1_700_000_000),
            order_type: json!(kind),
            rate: json!(0.05),
            amount: json!(1.0),
        }
    }

    #[test]
    fn normalizes_buy_and_sell_trade_types() {
        let buy = normalize_trade(&entry(1, "buy")).unwrap();
        let sell = normalize_trade(&entry(2, "sell")).unwrap();
        assert_eq!(buy.order_type, OrderType::Bid);
        assert_eq!(sell.order_type, OrderType::Ask);
    }
}
