//! Priority estimation and per-node/per-service priority queues.
//!
//! Urgency history uses a chunk-last equi-partition threshold
//! estimator; the priority queue is FIFO within a priority level via a
//! wrapped ordering that breaks ties on enqueue time.

use orchestrator_common::error::Result;
use orchestrator_common::types::TaskId;
use orchestrator_core::priority::{
    PriorityEstimator, PriorityQueueRow, PriorityQueueSnapshot, PriorityTaskQueue,
};
use parking_lot::Mutex;
use priority_queue::PriorityQueue;
use std::collections::HashMap;
use std::path::PathBuf;

/// One non-decreasing urgency-sample history per service, persisted as
/// a single JSON document per node rather than one file per service.
pub struct AggregatedUrgencyHistory {
    path: PathBuf,
    histories: Mutex<HashMap<String, Vec<f64>>>,
}

impl AggregatedUrgencyHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let histories = Self::load(&path);
        Self {
            path,
            histories: Mutex::new(histories),
        }
    }

    fn load(path: &std::path::Path) -> HashMap<String, Vec<f64>> {
        std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn persist(&self, histories: &HashMap<String, Vec<f64>>) -> Result<()> {
        let bytes = serde_json::to_vec(histories)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Thresholds for `levels - 1` urgency boundaries, or `None` if
    /// fewer than `levels - 1` samples have been recorded yet.
    fn urgency_threshold(&self, service_name: &str, levels: u32) -> Option<Vec<f64>> {
        let histories = self.histories.lock();
        let history = histories.get(service_name)?;
        let needed = (levels.saturating_sub(1)) as usize;
        if history.len() < needed || needed == 0 {
            return None;
        }
        Some(split_into_chunks_last(history, needed))
    }

    fn insert(&self, service_name: &str, value: f64) -> Result<()> {
        let mut histories = self.histories.lock();
        let history = histories.entry(service_name.to_string()).or_default();
        let pos = history.partition_point(|&v| v <= value);
        history.insert(pos, value);
        self.persist(&histories)
    }
}

/// Splits `values` (already sorted) into `n` contiguous chunks, the
/// first `len % n` of which get one extra element, and returns the
/// last element of each chunk.
fn split_into_chunks_last(values: &[f64], n: usize) -> Vec<f64> {
    let len = values.len();
    let chunk_size = len / n;
    let remainder = len % n;
    let mut result = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let end = start + chunk_size + usize::from(i < remainder);
        result.push(values[end - 1]);
        start = end;
    }
    result
}

pub struct DefaultPriorityEstimator {
    history: AggregatedUrgencyHistory,
}

impl DefaultPriorityEstimator {
    pub fn new(history_path: impl Into<PathBuf>) -> Self {
        Self {
            history: AggregatedUrgencyHistory::new(history_path),
        }
    }
}

impl PriorityEstimator for DefaultPriorityEstimator {
    fn calculate_priority(
        &self,
        importance: u32,
        urgency: u32,
        levels: u32,
        importance_weight: f64,
        urgency_weight: f64,
    ) -> u32 {
        let denom = if levels > 1 { (levels - 1) as f64 } else { 1.0 };
        let importance_norm = f64::from(importance) / denom;
        let urgency_norm = f64::from(urgency) / denom;

        let score = importance_norm * importance_weight + urgency_norm * urgency_weight;
        let max_score = importance_weight + urgency_weight;
        let normalized = if max_score > 0.0 { score / max_score } else { 0.0 };

        let priority = (normalized * (levels as f64 - 1.0) + 0.5) as i64;
        priority.clamp(0, i64::from(levels.saturating_sub(1))) as u32
    }

    fn calculate_urgency(&self, service_name: &str, relative_remaining_time: f64, levels: u32) -> u32 {
        match self.history.urgency_threshold(service_name, levels) {
            None => 0,
            Some(thresholds) => {
                let mut urgency = 0;
                for value in thresholds {
                    if relative_remaining_time >= value {
                        urgency += 1;
                    } else {
                        break;
                    }
                }
                urgency
            }
        }
    }

    fn update_urgency_history(&self, service_name: &str, relative_remaining_time: f64) -> Result<()> {
        self.history.insert(service_name, relative_remaining_time)
    }
}

/// Orders queued tasks by priority (lower numeric value first), then by
/// arrival time (older first) within the same priority. `PriorityQueue`
/// is a max-heap, so this ordering is inverted relative to the raw
/// `priority` field: level 0 must compare as "greater" than level 9.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriorityWrapper {
    priority: u32,
    enqueued_at: f64,
}

impl Eq for PriorityWrapper {}

impl Ord for PriorityWrapper {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match other.priority.cmp(&self.priority) {
            std::cmp::Ordering::Equal => other
                .enqueued_at
                .partial_cmp(&self.enqueued_at)
                .unwrap_or(std::cmp::Ordering::Equal),
            ord => ord,
        }
    }
}

impl PartialOrd for PriorityWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

type QueueKey = (String, String);

/// In-memory per-node, per-service priority queues.
#[derive(Default)]
pub struct InMemoryPriorityTaskQueue {
    queues: Mutex<HashMap<QueueKey, PriorityQueue<TaskId, PriorityWrapper>>>,
}

impl InMemoryPriorityTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriorityTaskQueue for InMemoryPriorityTaskQueue {
    fn push(&self, node: &str, service: &str, priority: u32, task_id: TaskId, enqueued_at: f64) {
        let mut queues = self.queues.lock();
        let queue = queues.entry((node.to_string(), service.to_string())).or_default();
        queue.push(task_id, PriorityWrapper { priority, enqueued_at });
    }

    fn pop(&self, node: &str, service: &str) -> Option<(u32, TaskId)> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(&(node.to_string(), service.to_string()))?;
        queue.pop().map(|(task_id, wrapper)| (wrapper.priority, task_id))
    }

    fn depth(&self, node: &str, service: &str, priority: u32) -> usize {
        let queues = self.queues.lock();
        queues
            .get(&(node.to_string(), service.to_string()))
            .map(|q| q.iter().filter(|(_, w)| w.priority == priority).count())
            .unwrap_or(0)
    }

    /// For each service, each task id is attached to at most one
    /// priority row because the scan breaks out after the first
    /// matching row.
    fn snapshot(&self, node: &str, now: f64, visibility_window: f64) -> PriorityQueueSnapshot {
        let queues = self.queues.lock();
        let mut snapshot = PriorityQueueSnapshot::default();

        for ((queue_node, service), queue) in queues.iter() {
            if queue_node != node {
                continue;
            }

            let visible: Vec<(TaskId, u32, f64)> = queue
                .iter()
                .filter(|(_, w)| now - w.enqueued_at <= visibility_window)
                .map(|(task_id, w)| (*task_id, w.priority, w.enqueued_at))
                .collect();

            let mut by_priority: HashMap<u32, Vec<TaskId>> = HashMap::new();
            for (task_id, priority, _) in &visible {
                by_priority.entry(*priority).or_default().push(*task_id);
            }

            let mut rows: Vec<PriorityQueueRow> = by_priority
                .into_iter()
                .map(|(priority, task_ids)| PriorityQueueRow { priority, task_ids })
                .collect();
            rows.sort_by_key(|r| r.priority);

            snapshot.service_rows.insert(service.clone(), rows);
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_within_same_priority() {
        let queue = InMemoryPriorityTaskQueue::new();
        queue.push("node-1", "infer", 5, 100, 1.0);
        queue.push("node-1", "infer", 5, 101, 2.0);

        assert_eq!(queue.pop("node-1", "infer"), Some((5, 100)));
        assert_eq!(queue.pop("node-1", "infer"), Some((5, 101)));
    }

    #[test]
    fn lower_priority_index_pops_first() {
        let queue = InMemoryPriorityTaskQueue::new();
        queue.push("node-1", "infer", 9, 100, 1.0);
        queue.push("node-1", "infer", 1, 101, 2.0);

        assert_eq!(queue.pop("node-1", "infer"), Some((1, 101)));
    }

    #[test]
    fn urgency_threshold_requires_enough_samples() {
        let dir = std::env::temp_dir().join(format!("urgency-{}.json", std::process::id()));
        let estimator = DefaultPriorityEstimator::new(&dir);
        assert_eq!(estimator.calculate_urgency("svc", 0.9, 4), 0);
        estimator.update_urgency_history("svc", 0.9).unwrap();
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn priority_is_clamped_into_levels() {
        let dir = std::env::temp_dir().join(format!("urgency-clamp-{}.json", std::process::id()));
        let estimator = DefaultPriorityEstimator::new(&dir);
        let p = estimator.calculate_priority(9, 9, 10, 1.0, 1.0);
        assert_eq!(p, 9);
        let p = estimator.calculate_priority(0, 0, 10, 1.0, 1.0);
        assert_eq!(p, 0);
        let _ = std::fs::remove_file(&dir);
    }
}
