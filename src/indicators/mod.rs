//! The indicator engine (4.H): time-interval alignment, the OHLC cascade,
//! OBV/MA/RSI, and market-depth projection.
//!
//! Each stage is a pure function over already-queried rows plus a thin
//! query-construction helper; the glue that runs a stage on `RunEvery` and
//! wires callbacks lives in `runtime.rs` so these modules stay testable
//! without a live store.

pub mod engine;
pub mod market_depth;
pub mod ma;
pub mod obv;
pub mod ohlc_base;
pub mod ohlc_uplevel;
pub mod rsi;

pub use engine::{run_market_depth_live, run_market_depth_pull, run_ohlc_cascade, MetricsSource};
