#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Core domain traits for the edge-cloud workload orchestrator.
//!
//! This crate defines the abstractions implemented by
//! `orchestrator-engine` (DAG, scheduler, priority), `orchestrator-store`
//! (distributor) and `orchestrator-cache` (instance cache), so those
//! crates and `orchestrator-cli` can depend on contracts rather than on
//! each other's concrete types.

pub mod cache;
pub mod cluster;
pub mod dag;
pub mod distributor;
pub mod priority;
pub mod scheduler;
pub mod transport;

pub use cache::{CacheStats, InstanceFactory};
pub use cluster::ClusterDriver;
pub use dag::{DagModel, DagValidation};
pub use distributor::{Distributor, ResultPage};
pub use priority::{PriorityEstimator, PriorityQueueRow, PriorityQueueSnapshot, PriorityTaskQueue};
pub use scheduler::{SchedulePlan, SchedulerAgent, StartupPolicy};
pub use transport::{NodeForwarder, Processor};
