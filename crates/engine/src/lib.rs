#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Control-plane glue: owns one AIMD scheduler agent per data source,
//! a copy-on-read device resource table, and the startup policy used
//! before a source has any delay history.

use dashmap::DashMap;
use orchestrator_common::config::{AimdConfig, StartupPolicyConfig};
use orchestrator_common::types::{Dag, DeviceId, ResourceDescriptor, SourceId};
use orchestrator_core::dag::DagModel;
use orchestrator_core::scheduler::{SchedulePlan, SchedulerAgent, StartupPolicy};
use tracing::{info, instrument};

pub mod cluster;
pub mod control_http;
pub mod controller;
pub mod dag;
pub mod generator;
pub mod priority;
pub mod scheduler;

use scheduler::{AimdSchedulerAgent, ConfiguredStartupPolicy};

pub use cluster::InMemoryClusterDriver;
pub use controller::{Controller, PassthroughProcessor};
pub use dag::PetgraphDagModel;
pub use generator::{compute_rate_mode, ChunkSource, Generator, PeriodicChunkSource, RateMode};
pub use priority::{AggregatedUrgencyHistory, DefaultPriorityEstimator, InMemoryPriorityTaskQueue};

/// Registry of per-source scheduler agents plus the shared resource
/// snapshot table, generalizing a single shared scheduler into one
/// agent per source behind a `DashMap`.
pub struct ControlPlane {
    agents: DashMap<SourceId, AimdSchedulerAgent>,
    resources: DashMap<DeviceId, ResourceDescriptor>,
    aimd_defaults: AimdConfig,
    startup_policy: ConfiguredStartupPolicy,
    edge_device: DeviceId,
    cloud_device: DeviceId,
}

impl ControlPlane {
    pub fn new(aimd_defaults: AimdConfig, startup: StartupPolicyConfig, edge_device: DeviceId, cloud_device: DeviceId) -> Self {
        Self {
            agents: DashMap::new(),
            resources: DashMap::new(),
            aimd_defaults,
            startup_policy: ConfiguredStartupPolicy::new(startup.placements.into_iter().collect()),
            edge_device,
            cloud_device,
        }
    }

    /// Registers a scheduler agent the first time a source is seen; a
    /// no-op on subsequent calls for the same source.
    #[instrument(skip(self))]
    pub fn register_source(&self, source_id: SourceId, latency_constraint: f64) {
        self.agents.entry(source_id).or_insert_with(|| {
            info!(source_id, "registering scheduler agent");
            AimdSchedulerAgent::new(source_id, latency_constraint, self.aimd_defaults)
        });
    }

    /// Forwards one observed end-to-end delay to the owning agent.
    pub fn on_scenario_update(&self, source_id: SourceId, delay_seconds: f64) {
        if let Some(mut agent) = self.agents.get_mut(&source_id) {
            agent.record_delay(delay_seconds);
        }
    }

    /// Atomically replaces one device's resource entry; visible to every
    /// reader without taking a table-wide lock.
    pub fn on_resource_update(&self, device: DeviceId, descriptor: ResourceDescriptor) {
        self.resources.insert(device, descriptor);
    }

    pub fn resource_snapshot(&self) -> std::collections::HashMap<DeviceId, ResourceDescriptor> {
        self.resources.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    /// Current placement plan for `pipeline` belonging to `source_id`,
    /// falling back to the startup policy if the source has not been
    /// registered yet.
    pub fn schedule_plan(&self, source_id: SourceId, pipeline: &[String]) -> SchedulePlan {
        match self.agents.get_mut(&source_id) {
            Some(mut agent) => agent.get_schedule_plan(pipeline, &self.edge_device, &self.cloud_device),
            None => self.startup_policy.startup_plan(pipeline, &self.edge_device, &self.cloud_device),
        }
    }

    /// Linearizes `template`, asks for a fresh schedule plan, and
    /// rebuilds a placed `Dag` from it via `DagModel::extract_dag_from_pipeline`.
    /// If `template` can't be linearized, the plan can't be computed
    /// either, so `template` is returned unplaced rather than failing
    /// the caller.
    pub fn place_dag(&self, dag_model: &dyn DagModel, source_id: SourceId, template: &Dag) -> Dag {
        match dag_model.extract_pipeline(template) {
            Ok(pipeline) => {
                let plan = self.schedule_plan(source_id, &pipeline);
                dag_model.extract_dag_from_pipeline(template, &plan.placements)
            }
            Err(_) => template.clone(),
        }
    }
}
