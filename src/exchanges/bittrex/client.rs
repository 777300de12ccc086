//! The collaborator boundary for Bittrex's REST client library.

use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RawMarketSummary {
    pub market_name: String,
    pub high: Value,
    pub low: Value,
    pub volume: Value,
    pub last: Value,
    pub base_volume: Value,
    pub timestamp: Value,
    pub bid: Value,
    pub ask: Value,
    pub open_buy_orders: Value,
    pub open_sell_orders: Value,
    pub prev_day: Value,
    pub created: Value,
}

#[derive(Debug, Clone)]
pub struct RawOrder {
    pub rate: Value,
    pub quantity: Value,
}

#[derive(Debug, Clone)]
pub struct RawOrderBook {
    pub buy: Vec<RawOrder>,
    pub sell: Vec<RawOrder>,
}

#[derive(Debug, Clone)]
pub struct RawMarketHistoryTrade {
    pub id: Value,
    pub timestamp: Value,
    pub quantity: Value,
    pub price: Value,
    pub total: Value,
    pub fill_type: Value,
    pub order_type: Value,
}

#[async_trait]
pub trait BittrexPublicClient: Send + Sync {
    async fn get_market_summaries(&self) -> Result<Vec<RawMarketSummary>, ClientError>;
    async fn get_order_book(&self, market: &str) -> Result<RawOrderBook, ClientError>;
    async fn get_market_history(&self, market: &str) -> Result<Vec<RawMarketHistoryTrade>, ClientError>;
}
