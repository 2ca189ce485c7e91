//! Per-device Controller: runs a task's current stage locally or
//! forwards it to the stage's assigned device, then re-evaluates
//! placement for the next stage.

use async_trait::async_trait;
use orchestrator_common::error::{Error, Result};
use orchestrator_common::types::{DeviceId, Task, TAG_TRANSMIT};
use orchestrator_core::distributor::Distributor;
use orchestrator_core::transport::{NodeForwarder, Processor};
use std::sync::Arc;
use tracing::{info, instrument};

/// Stage execution itself (sensor decoding, inference, ...) is an
/// external collaborator; this stub marks the current stage processed
/// without touching content, so the Controller's routing can be
/// exercised independent of any real workload backend.
#[derive(Debug, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl Processor for PassthroughProcessor {
    async fn process(&self, task: Task) -> Result<Task> {
        Ok(task)
    }
}

/// Drives one task through its DAG one stage at a time, honoring the
/// placement plan already stamped onto each stage's `execute_device`.
pub struct Controller {
    local_device: DeviceId,
    processor: Arc<dyn Processor>,
    forwarder: Arc<dyn NodeForwarder>,
    distributor: Arc<dyn Distributor>,
}

impl Controller {
    pub fn new(
        local_device: DeviceId,
        processor: Arc<dyn Processor>,
        forwarder: Arc<dyn NodeForwarder>,
        distributor: Arc<dyn Distributor>,
    ) -> Self {
        Self {
            local_device,
            processor,
            forwarder,
            distributor,
        }
    }

    /// Runs `task` through every remaining stage, forwarding across
    /// devices as needed, and hands the terminal result to the
    /// distributor.
    #[instrument(skip(self, task), fields(source_id = task.source_id, task_id = task.task_id))]
    pub async fn drive(&self, mut task: Task, now: impl Fn() -> f64) -> Result<Task> {
        loop {
            let stage = task
                .current_stage()
                .ok_or_else(|| Error::Orchestration("task has no current stage".to_string()))?;
            let device = stage.service.execute_device.clone();

            task = if device == self.local_device {
                self.processor.process(task).await?
            } else {
                task.record_timestamp(TAG_TRANSMIT, false, now());
                let returned = self.forwarder.forward(&device, task).await?;
                let mut returned = returned;
                returned.record_timestamp(TAG_TRANSMIT, true, now());
                returned
            };

            if task.is_terminal() {
                break;
            }
            task.advance_stage();
        }

        task.record_timestamp(orchestrator_common::types::TAG_TOTAL, true, now());
        self.distributor.save(&task).await?;
        info!(source_id = task.source_id, task_id = task.task_id, "task reached terminal stage");
        Ok(task)
    }
}
