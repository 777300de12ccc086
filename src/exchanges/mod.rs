//! Per-exchange ingestors (4.D). The concrete REST/WebSocket client
//! libraries are external collaborators (out of scope per the engine's own
//! boundary) -- each exchange module defines the trait its ingestor needs
//! and the normalization from a raw decoded payload into this crate's
//! `Point`/`NewTrade`/`BookUpdate` model, which is the part that belongs to
//! this engine.

pub mod bittrex;
pub mod coinmarketcap;
pub mod poloniex;
