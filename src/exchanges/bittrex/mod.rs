//! Bittrex ingestion: REST-only, built entirely from request-executor
//! pull loops -- market summaries, order-book snapshots, and market
//! history with watermarking.

pub mod client;
pub mod markethistory;
pub mod marketsummary;
pub mod orderbook;

pub use client::{BittrexPublicClient, RawMarketHistoryTrade, RawMarketSummary, RawOrder, RawOrderBook};
