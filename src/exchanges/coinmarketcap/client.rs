//! The collaborator boundary for the Coinmarketcap REST client library.

use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RawTick {
    pub id: Value,
    pub name: Value,
    pub symbol: Value,
    pub rank: Value,
    pub price_usd: Value,
    pub price_btc: Value,
    pub day_volume_usd: Value,
    pub market_cap_usd: Value,
    pub available_supply: Value,
    pub total_supply: Value,
    pub percent_change_1h: Value,
    pub percent_change_24h: Value,
    pub percent_change_7d: Value,
    pub last_updated: Value,
}

#[derive(Debug, Clone)]
pub struct RawGlobalData {
    pub total_market_cap_usd: Value,
    pub total_24h_volume_usd: Value,
    pub bitcoin_percentage_of_market_cap: Value,
    pub active_currencies: Value,
    pub active_assets: Value,
    pub active_markets: Value,
}

#[async_trait]
pub trait CoinMarketCapClient: Send + Sync {
    async fn get_tickers(&self) -> Result<Vec<RawTick>, ClientError>;
    async fn get_global_data(&self) -> Result<RawGlobalData, ClientError>;
}
