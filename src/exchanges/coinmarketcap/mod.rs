//! Coinmarketcap ingestion: two independent REST pulls, per-asset ticks
//! and a single global-data snapshot. No order book, no trade tape -- the
//! simplest ingestor shape in this crate.

pub mod client;
pub mod globaldata;
pub mod ticker;

pub use client::{CoinMarketCapClient, RawGlobalData, RawTick};
