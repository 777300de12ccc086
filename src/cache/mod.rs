//! The last-OHLC cache (4.I) and the EMA-seed cache it shares a shape with:
//! both are per-(exchange, period) sliding windows kept under a `RwLock` so
//! a cheap read doesn't block other markets' writers.

pub mod last_ohlc;
pub mod ma_cache;

pub use last_ohlc::LastOhlcCache;
pub use ma_cache::EmaSeedCache;

use std::time::Duration;

/// Keys both caches by the data source they're derived from (exchange name
/// as it appears in `schema["database"]`) and the OHLC period.
pub type CacheKey = (String, Duration);
