//! Per-source adaptive (AIMD) scheduler contract.

use orchestrator_common::types::{DeviceId, SourceId};
use std::collections::HashMap;

/// A placement decision: for each stage id, which device executes it,
/// plus the pipeline-segmentation index the decision was derived from.
#[derive(Debug, Clone, Default)]
pub struct SchedulePlan {
    /// Index into the linearized pipeline chain at which execution
    /// crosses from edge to cloud devices.
    pub pipe_seg: u32,
    pub placements: HashMap<String, DeviceId>,
}

/// A per-source feedback-control loop: observes end-to-end delay
/// samples and adjusts `pipe_seg` via additive-increase /
/// multiplicative-decrease.
pub trait SchedulerAgent: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Record one end-to-end delay observation in seconds.
    fn record_delay(&mut self, delay_seconds: f64);

    /// Compute (and internally advance) the next schedule plan given
    /// the pipeline chain and the edge/cloud device pair.
    fn get_schedule_plan(
        &mut self,
        pipeline: &[String],
        edge_device: &DeviceId,
        cloud_device: &DeviceId,
    ) -> SchedulePlan;
}

/// Fallback placement used before any AIMD history exists for a source.
pub trait StartupPolicy: Send + Sync {
    fn startup_plan(
        &self,
        pipeline: &[String],
        edge_device: &DeviceId,
        cloud_device: &DeviceId,
    ) -> SchedulePlan;
}
