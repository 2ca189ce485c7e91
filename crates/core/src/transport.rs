//! Seams between the control-plane glue (`orchestrator-engine`) and the
//! concrete HTTP transport (`orchestrator-transport`) / in-process stage
//! execution.

use async_trait::async_trait;
use orchestrator_common::error::Result;
use orchestrator_common::types::{DeviceId, Task};

/// Runs one DAG stage's service against a task's current content,
/// in-process, on the local device.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, task: Task) -> Result<Task>;
}

/// Forwards a task to another device's Controller over the network.
#[async_trait]
pub trait NodeForwarder: Send + Sync {
    async fn forward(&self, device: &DeviceId, task: Task) -> Result<Task>;
}
