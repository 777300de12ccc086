//! The fundamental record written to the store, and the batch envelope
//! ingestors use to hand a group of them to the flusher.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A scalar field value. The store schema only ever needs these three
/// kinds; keeping the enum closed avoids a dynamic-typing dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Bool(_) => None,
        }
    }
}

/// One row destined for the time-series store.
///
/// Invariant: within one measurement, for a given (tag-set, timestamp) the
/// latest write wins -- this crate never attempts to merge two Points with
/// the same key, it simply lets the store's last-write-wins semantics apply.
#[derive(Debug, Clone)]
pub struct Point {
    pub measurement: String,
    pub tags: HashMap<String, String>,
    pub fields: HashMap<String, FieldValue>,
    /// Nanosecond unix timestamp.
    pub timestamp_ns: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp_ns: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: HashMap::new(),
            fields: HashMap::new(),
            timestamp_ns,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A callback fired after a batch's points have been durably flushed.
/// Not invoked if the write fails, and never invoked twice.
pub type FlushCallback = Arc<dyn Fn() + Send + Sync>;

/// One logically related group of Points submitted by a producer.
///
/// `type_tag` is a free-form debug-accounting hint (e.g. `"orderBook"`,
/// `"tick"`); the flusher never branches on it for correctness, only for
/// the optional debug summary line.
#[derive(Clone)]
pub struct BatchPoints {
    pub type_tag: String,
    pub points: Vec<Point>,
    pub callback: Option<FlushCallback>,
}

impl fmt::Debug for BatchPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchPoints")
            .field("type_tag", &self.type_tag)
            .field("points", &self.points.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl BatchPoints {
    pub fn new(type_tag: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            type_tag: type_tag.into(),
            points,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: FlushCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}
