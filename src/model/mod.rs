//! Domain types shared across ingestors, the reconstructor, the reconciler,
//! and the indicator engine.

pub mod indicator;
pub mod market;
pub mod ohlc;
pub mod orderbook;
pub mod point;

pub use indicator::Indicator;
pub use market::{Market, MarketTable};
pub use ohlc::Ohlc;
pub use orderbook::{BookUpdate, NewTrade, Order, OrderBook, OrderLevel, OrderType};
pub use point::{BatchPoints, FieldValue, FlushCallback, Point};
