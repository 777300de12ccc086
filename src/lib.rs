//! Market-data ingestion and derived-metrics engine.
//!
//! Pulls and subscribes to Poloniex, Bittrex and CoinMarketCap, normalizes
//! every payload into `Point`s, and derives OHLC/OBV/MA/RSI/market-depth
//! series from what lands in the store. See `runtime::Runtime` for how the
//! pieces are wired together at startup.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod exchanges;
pub mod indicators;
pub mod market_history;
pub mod model;
pub mod numeric;
pub mod reconciler;
pub mod reconstructor;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod subscription;

pub use config::Config;
pub use runtime::Runtime;
