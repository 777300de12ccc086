//! The collaborator boundary: Poloniex's REST (`publicapi`) and WebSocket
//! (`pushapi`) client libraries live outside this crate. These traits are
//! the seam the ingestors in `market.rs`/`ticks.rs`/`orderbook.rs` depend
//! on; everything below the seam (HTTP, WebSocket framing, auth) belongs to
//! whatever concrete client is wired into a `Runtime`.
//!
//! Payload fields that Poloniex may serialize as either a JSON number or a
//! numeric string (rates, quantities, sequence numbers, trade ids) are kept
//! as `serde_json::Value` here and resolved through `crate::numeric` at the
//! normalization boundary, never implicitly widened to `f64` by a naive
//! `Deserialize` derive.

use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct RawTick {
    pub currency_pair: String,
    pub last: Value,
    pub lowest_ask: Value,
    pub highest_bid: Value,
    pub percent_change: Value,
    pub base_volume: Value,
    pub quote_volume: Value,
    pub is_frozen: Value,
    pub high_24hr: Value,
    pub low_24hr: Value,
}

#[derive(Debug, Clone)]
pub struct RawOrder {
    pub rate: Value,
    pub quantity: Value,
}

#[derive(Debug, Clone)]
pub struct RawOrderBook {
    pub sequence: Value,
    pub asks: Vec<RawOrder>,
    pub bids: Vec<RawOrder>,
}

/// One trade as reported by Poloniex's public trade-history endpoint, used
/// only by the missing-trade reconciler to refill gaps the push feed left
/// in the store.
#[derive(Debug, Clone)]
pub struct RawTradeHistoryEntry {
    pub trade_id: Value,
    pub date: Value,
    pub order_type: Value,
    pub rate: Value,
    pub amount: Value,
}

/// One entry in a push-fed market-update bundle. Variant names mirror the
/// three kinds Poloniex's market push channel emits.
#[derive(Debug, Clone)]
pub enum MarketUpdate {
    OrderBookModify {
        order_type: Value,
        rate: Value,
        amount: Value,
    },
    OrderBookRemove {
        order_type: Value,
        rate: Value,
    },
    NewTrade {
        order_type: Value,
        rate: Value,
        amount: Value,
        date: Value,
        trade_id: Value,
    },
}

#[derive(Debug, Clone)]
pub struct MarketUpdateBundle {
    pub sequence: Value,
    pub updates: Vec<MarketUpdate>,
}

#[async_trait]
pub trait PoloniexPublicClient: Send + Sync {
    async fn get_tickers(&self) -> Result<HashMap<String, RawTick>, ClientError>;
    async fn get_order_books(&self, depth: usize) -> Result<HashMap<String, RawOrderBook>, ClientError>;

    /// Public trade history for `currency_pair` over `[start_sec, end_sec]`,
    /// used only by the missing-trade reconciler to refetch ids the push
    /// feed never delivered.
    async fn get_trade_history(
        &self,
        currency_pair: &str,
        start_sec: i64,
        end_sec: i64,
    ) -> Result<Vec<RawTradeHistoryEntry>, ClientError>;
}

#[async_trait]
pub trait PoloniexPushClient: Send + Sync {
    async fn subscribe_ticker(&self) -> Result<mpsc::Receiver<RawTick>, ClientError>;
    async fn subscribe_market(&self, currency_pair: &str) -> Result<mpsc::Receiver<MarketUpdateBundle>, ClientError>;
}
