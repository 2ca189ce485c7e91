//! Priority estimation and per-node/per-service priority queues.

use orchestrator_common::error::Result;
use orchestrator_common::types::TaskId;

/// Combines a task's importance and urgency into a single priority
/// level in `[0, levels - 1]`.
pub trait PriorityEstimator: Send + Sync {
    /// Weighted, normalized, rounded-and-clamped priority score.
    fn calculate_priority(
        &self,
        importance: u32,
        urgency: u32,
        levels: u32,
        importance_weight: f64,
        urgency_weight: f64,
    ) -> u32;

    /// Maps `relative_remaining_time` (a task's `(now - start) /
    /// deadline` ratio) to an urgency level using the chunk-last
    /// equi-partition of this service's persisted urgency history.
    fn calculate_urgency(&self, service_name: &str, relative_remaining_time: f64, levels: u32) -> u32;

    /// Records `relative_remaining_time` into `service_name`'s
    /// persisted, non-decreasing urgency history.
    fn update_urgency_history(&self, service_name: &str, relative_remaining_time: f64) -> Result<()>;
}

/// One visible row of a node's priority-queue snapshot for a given
/// service.
#[derive(Debug, Clone)]
pub struct PriorityQueueRow {
    pub priority: u32,
    pub task_ids: Vec<TaskId>,
}

/// Snapshot of every service's priority queue on one node, as exposed
/// to the operator.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueueSnapshot {
    pub service_rows: std::collections::HashMap<String, Vec<PriorityQueueRow>>,
}

/// Per-node, per-service FIFO-within-priority task queues.
pub trait PriorityTaskQueue: Send + Sync {
    fn push(&self, node: &str, service: &str, priority: u32, task_id: TaskId, enqueued_at: f64);

    /// Pops the oldest task at the highest available priority for
    /// `(node, service)`.
    fn pop(&self, node: &str, service: &str) -> Option<(u32, TaskId)>;

    fn depth(&self, node: &str, service: &str, priority: u32) -> usize;

    /// A read-only snapshot of all services queued on `node`, visible
    /// within `visibility_window` seconds of `now`. Preserves a
    /// "first match wins" quirk: within one service's priority rows, a
    /// task id appears at most once across the whole snapshot, never
    /// once per priority level it happens to sit at.
    fn snapshot(&self, node: &str, now: f64, visibility_window: f64) -> PriorityQueueSnapshot;
}
