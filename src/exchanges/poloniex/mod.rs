//! Poloniex ingestion: a push-fed ticker stream, a push-fed per-market
//! order-book/trade stream, a periodically polled REST order-book snapshot
//! used both to seed the reconstructor and as a hard-refetch cadence
//! against push-feed drift, and a missing-trade reconciler that refetches
//! trade ids the push feed dropped.

pub mod client;
pub mod market;
pub mod orderbook;
pub mod reconciler;
pub mod ticks;

pub use client::{MarketUpdate, PoloniexPublicClient, PoloniexPushClient, RawOrderBook, RawTick};
