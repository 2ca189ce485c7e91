//! Per-source AIMD scheduler: an additive-increase / multiplicative-
//! decrease feedback loop over observed end-to-end delay.

use orchestrator_common::config::AimdConfig;
use orchestrator_common::types::{DeviceId, SourceId};
use orchestrator_core::scheduler::{SchedulePlan, SchedulerAgent, StartupPolicy};
use std::collections::VecDeque;
use tracing::info;

/// Bounded EWMA history of recent end-to-end delay samples (seconds).
#[derive(Debug, Default)]
struct DelayHistory {
    buffer: VecDeque<f64>,
    capacity: usize,
}

impl DelayHistory {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, delay: f64) {
        if delay < 0.0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(delay);
    }

    /// EWMA folded oldest to newest, or `None` if empty.
    fn smoothed(&self, alpha: f64) -> Option<f64> {
        self.buffer.iter().fold(None, |acc, &d| {
            Some(match acc {
                None => d,
                Some(prev) => alpha * d + (1.0 - alpha) * prev,
            })
        })
    }
}

/// Per-source additive-increase/multiplicative-decrease placement
/// controller: adjusts how many leading pipeline stages execute on the
/// edge device (`pipe_seg`) to keep smoothed end-to-end delay inside a
/// hysteresis band around `latency_constraint`.
pub struct AimdSchedulerAgent {
    source_id: SourceId,
    latency_constraint: f64,
    cfg: AimdConfig,
    history: DelayHistory,
    pipe_seg: Option<u32>,
    since_last_adjust: u32,
    high_breach_count: u32,
    low_breach_count: u32,
    increase_accum: f64,
}

impl AimdSchedulerAgent {
    pub fn new(source_id: SourceId, latency_constraint: f64, cfg: AimdConfig) -> Self {
        Self {
            source_id,
            latency_constraint,
            history: DelayHistory::new(cfg.history_window),
            cfg,
            pipe_seg: None,
            since_last_adjust: 0,
            high_breach_count: 0,
            low_breach_count: 0,
            increase_accum: 0.0,
        }
    }
}

impl SchedulerAgent for AimdSchedulerAgent {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn record_delay(&mut self, delay_seconds: f64) {
        self.history.push(delay_seconds);
    }

    fn get_schedule_plan(
        &mut self,
        pipeline: &[String],
        edge_device: &DeviceId,
        cloud_device: &DeviceId,
    ) -> SchedulePlan {
        let pipeline_len = pipeline.len() as u32;
        let min_edge = 0u32;
        let max_edge = pipeline_len;

        let pipe_seg = self
            .pipe_seg
            .get_or_insert_with(|| self.cfg.init_pipe_seg.clamp(min_edge, max_edge));

        let smoothed = self.history.smoothed(self.cfg.alpha);
        let upper = self.latency_constraint * (1.0 + self.cfg.hysteresis);
        let lower = self.latency_constraint * (1.0 - self.cfg.hysteresis);

        let mut adjusted = false;

        if let Some(delay) = smoothed {
            if pipeline_len > 0 {
                if self.since_last_adjust >= self.cfg.cooldown_steps {
                    if delay > upper && *pipe_seg > min_edge {
                        self.high_breach_count += 1;
                        self.low_breach_count = 0;
                        if self.high_breach_count >= self.cfg.breach_needed {
                            let scaled = (*pipe_seg as f64 * self.cfg.decrease_factor.clamp(0.0, 1.0))
                                .floor() as u32;
                            let new_seg = if scaled == *pipe_seg && *pipe_seg > min_edge {
                                pipe_seg.saturating_sub(self.cfg.step.max(1))
                            } else {
                                scaled
                            };
                            *pipe_seg = new_seg.max(min_edge);
                            adjusted = true;
                            self.increase_accum = 0.0;
                            self.high_breach_count = 0;
                        }
                    } else if delay < lower && *pipe_seg < max_edge {
                        self.low_breach_count += 1;
                        self.high_breach_count = 0;
                        if self.low_breach_count >= self.cfg.breach_needed {
                            self.increase_accum += self.cfg.increase_rate.max(0.0);
                            let inc = self.increase_accum.floor() as u32;
                            if inc > 0 {
                                *pipe_seg = (*pipe_seg + inc).min(max_edge);
                                self.increase_accum -= inc as f64;
                                adjusted = true;
                                self.low_breach_count = 0;
                            }
                        }
                    } else {
                        self.high_breach_count = 0;
                        self.low_breach_count = 0;
                    }
                } else {
                    self.high_breach_count = 0;
                    self.low_breach_count = 0;
                }
            }
        }

        self.since_last_adjust = if adjusted { 0 } else { self.since_last_adjust + 1 };

        let pipe_seg = self.pipe_seg.unwrap_or(0).clamp(0, pipeline_len);
        info!(source_id = self.source_id, pipe_seg, "adaptive feedback decision");

        build_plan(pipeline, pipe_seg, edge_device, cloud_device)
    }
}

/// Synthetic bracket stage ids bookending every pipeline: `start`
/// always executes on the edge device, `end` always on the cloud
/// device, regardless of where the pipeline's own stages land.
pub const SYNTHETIC_START_STAGE: &str = "start";
pub const SYNTHETIC_END_STAGE: &str = "end";

fn build_plan(pipeline: &[String], pipe_seg: u32, edge_device: &DeviceId, cloud_device: &DeviceId) -> SchedulePlan {
    let mut placements = std::collections::HashMap::new();
    for (idx, stage_id) in pipeline.iter().enumerate() {
        let device = if (idx as u32) < pipe_seg { edge_device } else { cloud_device };
        placements.insert(stage_id.clone(), device.clone());
    }
    placements.insert(SYNTHETIC_START_STAGE.to_string(), edge_device.clone());
    placements.insert(SYNTHETIC_END_STAGE.to_string(), cloud_device.clone());
    SchedulePlan { pipe_seg, placements }
}

/// Deterministic placement used before any AIMD history exists for a
/// source, driven by a configured stage->device table with a same-edge
/// fallback for unlisted stages.
pub struct ConfiguredStartupPolicy {
    placements: std::collections::HashMap<String, DeviceId>,
}

impl ConfiguredStartupPolicy {
    pub fn new(placements: std::collections::HashMap<String, DeviceId>) -> Self {
        Self { placements }
    }
}

impl StartupPolicy for ConfiguredStartupPolicy {
    fn startup_plan(&self, pipeline: &[String], edge_device: &DeviceId, cloud_device: &DeviceId) -> SchedulePlan {
        let mut placements = std::collections::HashMap::new();
        for stage_id in pipeline {
            let device = self.placements.get(stage_id).cloned().unwrap_or_else(|| edge_device.clone());
            placements.insert(stage_id.clone(), device);
        }
        placements.insert(SYNTHETIC_START_STAGE.to_string(), edge_device.clone());
        placements.insert(SYNTHETIC_END_STAGE.to_string(), cloud_device.clone());
        SchedulePlan { pipe_seg: 0, placements }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("stage{i}")).collect()
    }

    #[test]
    fn starts_at_configured_init_pipe_seg() {
        let cfg = AimdConfig::default();
        let mut agent = AimdSchedulerAgent::new(1, 1.0, cfg);
        let plan = agent.get_schedule_plan(&pipeline(4), &"edge".to_string(), &"cloud".to_string());
        assert_eq!(plan.pipe_seg, 0);
    }

    #[test]
    fn decreases_edge_segment_after_sustained_high_latency() {
        let cfg = AimdConfig { breach_needed: 2, cooldown_steps: 0, init_pipe_seg: 4, ..AimdConfig::default() };
        let mut agent = AimdSchedulerAgent::new(1, 1.0, cfg);
        let stages = pipeline(4);
        agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());

        for _ in 0..3 {
            agent.record_delay(5.0);
            agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());
        }
        let plan = agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());
        assert!(plan.pipe_seg < 4, "expected pipe_seg to shrink under sustained high latency, got {}", plan.pipe_seg);
    }

    #[test]
    fn plan_brackets_pipeline_with_synthetic_start_and_end() {
        let cfg = AimdConfig::default();
        let mut agent = AimdSchedulerAgent::new(1, 1.0, cfg);
        let plan = agent.get_schedule_plan(&pipeline(4), &"edge".to_string(), &"cloud".to_string());
        assert_eq!(plan.placements.get(SYNTHETIC_START_STAGE), Some(&"edge".to_string()));
        assert_eq!(plan.placements.get(SYNTHETIC_END_STAGE), Some(&"cloud".to_string()));
    }

    #[test]
    fn increases_edge_segment_after_sustained_low_latency() {
        let cfg = AimdConfig { breach_needed: 2, cooldown_steps: 0, init_pipe_seg: 0, ..AimdConfig::default() };
        let mut agent = AimdSchedulerAgent::new(1, 1.0, cfg);
        let stages = pipeline(4);
        agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());

        for _ in 0..3 {
            agent.record_delay(0.01);
            agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());
        }
        let plan = agent.get_schedule_plan(&stages, &"edge".to_string(), &"cloud".to_string());
        assert!(plan.pipe_seg > 0, "expected pipe_seg to grow under sustained low latency, got {}", plan.pipe_seg);
    }
}
