//! Shared domain types for the edge-cloud workload orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Data source identifier.
pub type SourceId = i64;

/// Task identifier, monotonically increasing per source.
pub type TaskId = i64;

/// Named host in the cluster (an edge node or the single cloud node).
pub type DeviceId = String;

/// Mutable configuration knobs attached to a task (resolution, fps, ...).
pub type Metadata = HashMap<String, serde_json::Value>;

/// A value produced by a stage: either a JSON-native scalar or a binary
/// blob tagged with a sentinel (`image`, `topology`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Scalar(serde_json::Value),
    Blob {
        sentinel: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// A matched start/end pair for a single timestamp tag. Last-writer-wins
/// on both ends independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampPair {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimestampPair {
    pub fn duration(&self) -> Option<f64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        }
    }
}

/// Flat map of timestamp tag to its start/end pair, covering per-stage
/// start/end, per-stage priority-queue enter/exit, the DAG-level
/// `transmit` pair, and the `total` start/end pair.
pub type TimestampMap = HashMap<String, TimestampPair>;

/// The well-known tag for the whole-task wall clock.
pub const TAG_TOTAL: &str = "total";
/// The well-known tag for the rolling inter-device transmission cost.
pub const TAG_TRANSMIT: &str = "transmit";

/// Declares what a stage's bound inference function consumes/produces,
/// checked at DAG submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub name: String,
    pub input: String,
    pub output: String,
}

/// Per-stage mutable state: placement, priority/urgency, and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub binding: ServiceBinding,
    pub execute_device: DeviceId,
    pub priority: u32,
    pub urgency: u32,
    pub content: Option<ContentValue>,
}

impl Service {
    pub fn new(binding: ServiceBinding, execute_device: DeviceId) -> Self {
        Self {
            binding,
            execute_device,
            priority: 0,
            urgency: 0,
            content: None,
        }
    }
}

/// A DAG node: a processing stage plus its adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub prev: Vec<String>,
    pub succ: Vec<String>,
    pub service: Service,
}

/// Ordered directed-acyclic graph of stages, plus the synthetic entry
/// list. Cloned per-task; the template lives at the application level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dag {
    pub stages: HashMap<String, Stage>,
    pub start: Vec<String>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, stage: Stage) {
        self.stages.insert(stage.id.clone(), stage);
    }

    /// Breadth-first traversal order starting from `start`, used for
    /// validation and for finding the most-recently-produced content.
    pub fn bfs_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut queue: std::collections::VecDeque<String> = self.start.iter().cloned().collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            if let Some(stage) = self.stages.get(&id) {
                for next in &stage.succ {
                    if !seen.contains(next) {
                        queue.push_back(next.clone());
                    }
                }
            }
        }
        order
    }
}

/// `{importance_weight, urgency_weight, priority_levels, deadline_seconds}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityCoefficients {
    pub importance_weight: f64,
    pub urgency_weight: f64,
    pub priority_levels: u32,
    pub deadline_seconds: f64,
}

impl Default for PriorityCoefficients {
    fn default() -> Self {
        Self {
            importance_weight: 1.0,
            urgency_weight: 1.0,
            priority_levels: 10,
            deadline_seconds: 1.0,
        }
    }
}

/// The unit of work flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub source_id: SourceId,
    pub task_id: TaskId,
    pub metadata: Metadata,
    pub raw_metadata: Metadata,
    pub dag: Dag,
    pub file_path: String,
    pub timestamps: TimestampMap,
    /// `source_importance` in `[0, L-1]`.
    pub source_importance: u32,
    pub priority_coefficients: PriorityCoefficients,
    /// Id of the currently-active stage; advances monotonically through
    /// the DAG's topological order.
    pub flow_index: String,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_id: SourceId,
        task_id: TaskId,
        dag: Dag,
        metadata: Metadata,
        raw_metadata: Metadata,
        file_path: String,
        source_importance: u32,
        priority_coefficients: PriorityCoefficients,
    ) -> Self {
        let flow_index = dag.start.first().cloned().unwrap_or_default();
        Self {
            source_id,
            task_id,
            metadata,
            raw_metadata,
            dag,
            file_path,
            timestamps: TimestampMap::new(),
            source_importance,
            priority_coefficients,
            flow_index,
        }
    }

    /// Primary key for the distributor store.
    pub fn key(&self) -> (SourceId, TaskId) {
        (self.source_id, self.task_id)
    }

    /// Record (or overwrite, last-writer-wins) one half of a timestamp
    /// pair under `tag` at wall-clock `at`.
    pub fn record_timestamp(&mut self, tag: &str, is_end: bool, at: f64) {
        let pair = self.timestamps.entry(tag.to_string()).or_default();
        if is_end {
            pair.end = Some(at);
        } else {
            pair.start = Some(at);
        }
    }

    pub fn compute_duration(&self, tag: &str) -> Option<f64> {
        self.timestamps.get(tag).and_then(TimestampPair::duration)
    }

    pub fn total_start_time(&self) -> Option<f64> {
        self.timestamps.get(TAG_TOTAL).and_then(|p| p.start)
    }

    pub fn total_end_time(&self) -> Option<f64> {
        self.timestamps.get(TAG_TOTAL).and_then(|p| p.end)
    }

    /// Attach the output of the current stage as its content.
    pub fn set_current_content(&mut self, value: ContentValue) {
        if let Some(stage) = self.dag.stages.get_mut(&self.flow_index) {
            stage.service.content = Some(value);
        }
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.dag.stages.get(&self.flow_index)
    }

    pub fn current_stage_mut(&mut self) -> Option<&mut Stage> {
        self.dag.stages.get_mut(&self.flow_index)
    }

    /// Last produced content, in breadth-first traversal order.
    pub fn get_last_content(&self) -> Option<&ContentValue> {
        self.dag
            .bfs_order()
            .iter()
            .rev()
            .find_map(|id| self.dag.stages.get(id))
            .and_then(|s| s.service.content.as_ref())
    }

    pub fn priority_tag(&self, service_name: &str) -> String {
        format!("priority:{service_name}")
    }

    /// Advances `flow_index` to the current stage's sole successor
    /// (pipelines are chain-shaped by the time a task is running).
    /// Returns `None` once the terminal stage is reached.
    pub fn advance_stage(&mut self) -> Option<&str> {
        let next = self.current_stage().and_then(|s| s.succ.first().cloned())?;
        self.flow_index = next;
        Some(self.flow_index.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.current_stage().map(|s| s.succ.is_empty()).unwrap_or(true)
    }
}

/// A persisted distributor row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub source_id: SourceId,
    pub task_id: TaskId,
    pub ctime: f64,
    pub payload: Task,
}

/// A device's last-reported resource descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub cpu: f64,
    pub memory: f64,
    pub bandwidth: f64,
}
