//! The batch channel and flusher: fan-in queue of tagged point batches,
//! cadence-driven atomic flush to the store.

use crate::model::{BatchPoints, Point};
use crate::store::PointStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// The producer side of the channel. Cloned freely across ingestor workers.
#[derive(Clone)]
pub struct BatchSender {
    sender: mpsc::Sender<BatchPoints>,
}

impl BatchSender {
    pub async fn send(&self, batch: BatchPoints) -> Result<(), mpsc::error::SendError<BatchPoints>> {
        self.sender.send(batch).await
    }
}

/// Creates a bounded channel of the given capacity and the matching
/// receiver for the flush loop.
pub fn channel(capacity: usize) -> (BatchSender, mpsc::Receiver<BatchPoints>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (BatchSender { sender }, receiver)
}

/// Runs forever: every `period`, if the queue is non-empty, drains exactly
/// the depth observed at that instant and flushes it as one atomic store
/// write. Batches enqueued after the snapshot is taken wait for the next
/// tick (property 3).
pub async fn run_flusher(
    mut receiver: mpsc::Receiver<BatchPoints>,
    store: Arc<dyn PointStore>,
    period: Duration,
    label: &str,
) {
    loop {
        tokio::time::sleep(period).await;

        let depth = receiver.len();
        if depth == 0 {
            continue;
        }

        let mut batches = Vec::with_capacity(depth);
        for _ in 0..depth {
            match receiver.try_recv() {
                Ok(batch) => batches.push(batch),
                Err(_) => break,
            }
        }

        flush_batches(store.as_ref(), batches, label).await;
    }
}

/// Writes every point across the drained batches in one call to the store;
/// fires each batch's callback only if the write succeeded (property 2).
pub async fn flush_batches(store: &dyn PointStore, batches: Vec<BatchPoints>, label: &str) {
    if batches.is_empty() {
        return;
    }

    let all_points: Vec<Point> = batches.iter().flat_map(|b| b.points.clone()).collect();

    match store.write_batch(&all_points).await {
        Ok(()) => {
            for batch in &batches {
                if let Some(callback) = &batch.callback {
                    let callback = callback.clone();
                    tokio::spawn(async move { callback() });
                }
            }
            log_debug_summary(label, &batches);
        }
        Err(err) => {
            error!(error = %err, label, "flush_batches: store write failed");
        }
    }
}

/// Groups the flushed batches by `type_tag` and emits one debug summary
/// line, mirroring the per-database debug switch the teacher logs, but
/// generalized so a new type_tag never needs a new match arm.
fn log_debug_summary(label: &str, batches: &[BatchPoints]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let summary = summarize_by_type_tag(batches);
    let total_batches: usize = summary.values().map(|(b, _)| b).sum();
    let total_points: usize = summary.values().map(|(_, p)| p).sum();

    let mut detail = String::new();
    for (type_tag, (batch_count, point_count)) in &summary {
        detail.push_str(&format!(" {batch_count} {type_tag} ({point_count})"));
    }

    debug!("[{label} flush]: {total_batches} batchs ({total_points} points){detail}");
}

fn summarize_by_type_tag(batches: &[BatchPoints]) -> HashMap<String, (usize, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for batch in batches {
        let entry = counts.entry(batch.type_tag.clone()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += batch.points.len();
    }
    counts
}
