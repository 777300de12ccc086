//! In-memory `PointStore` used by tests and, optionally, local dev runs.

use super::{PointStore, Query, QueryRow};
use crate::error::StoreError;
use crate::model::Point;
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    points: Mutex<Vec<Point>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Point> {
        self.points.lock().clone()
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    async fn write_batch(&self, points: &[Point]) -> Result<(), StoreError> {
        self.points.lock().extend_from_slice(points);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<QueryRow>, StoreError> {
        let guard = self.points.lock();
        let mut rows: Vec<QueryRow> = guard
            .iter()
            .filter(|p| p.measurement == query.measurement)
            .filter(|p| p.timestamp_ns >= query.from_ns && p.timestamp_ns < query.to_ns)
            .filter(|p| {
                query
                    .tags
                    .iter()
                    .all(|(k, v)| p.tags.get(k) == Some(v))
            })
            .map(|p| QueryRow {
                tags: p.tags.clone(),
                fields: p.fields.clone(),
                timestamp_ns: p.timestamp_ns,
            })
            .collect();
        rows.sort_by_key(|r| r.timestamp_ns);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    #[tokio::test]
    async fn writes_and_queries_by_window_and_tag() {
        let store = MemoryStore::new();
        store
            .write_batch(&[
                Point::new("ticks", 100).tag("market", "BTC_ETH").field("last", 1.0_f64),
                Point::new("ticks", 200).tag("market", "BTC_ETH").field("last", 2.0_f64),
                Point::new("ticks", 150).tag("market", "BTC_XMR").field("last", 9.0_f64),
            ])
            .await
            .unwrap();

        let rows = store
            .query(&Query::new("ticks", 0, 1000).tag("market", "BTC_ETH"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp_ns, 100);
        assert_eq!(rows[1].timestamp_ns, 200);
    }
}
