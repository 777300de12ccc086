//! Abstraction over the time-series store.
//!
//! The engine never depends on a concrete database client directly; every
//! write and query goes through `PointStore` so the batch flusher, the
//! caches, and the indicator engine can be exercised against `MemoryStore`
//! in tests without a live database.

pub mod memory;

use crate::error::StoreError;
use crate::model::Point;
use async_trait::async_trait;

/// One row returned by a store query: a measurement's tags plus fields at
/// a point in time, already decoded into the same types `Point` uses.
#[derive(Debug, Clone)]
pub struct QueryRow {
    pub tags: std::collections::HashMap<String, String>,
    pub fields: std::collections::HashMap<String, crate::model::FieldValue>,
    pub timestamp_ns: i64,
}

/// A time-bounded, tag-filtered read against one measurement. Every caller
/// in this crate (base OHLC, MA seed lookup, the last-OHLC cache rebuild,
/// missing-trade reconciliation) reduces to this shape.
#[derive(Debug, Clone)]
pub struct Query {
    pub measurement: String,
    pub tags: std::collections::HashMap<String, String>,
    pub from_ns: i64,
    pub to_ns: i64,
}

impl Query {
    pub fn new(measurement: impl Into<String>, from_ns: i64, to_ns: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: std::collections::HashMap::new(),
            from_ns,
            to_ns,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait PointStore: Send + Sync {
    /// Writes a batch of points atomically: either every point lands or
    /// none do, matching the flusher's all-or-nothing retry semantics.
    async fn write_batch(&self, points: &[Point]) -> Result<(), StoreError>;

    /// Returns every row matching the query's measurement, tag filter and
    /// half-open `[from_ns, to_ns)` window, ordered by ascending timestamp.
    async fn query(&self, query: &Query) -> Result<Vec<QueryRow>, StoreError>;
}
