//! Node-to-node HTTP transport: forwards tasks between Controllers and
//! pushes scenario/resource updates to the Scheduler.

use async_trait::async_trait;
use orchestrator_common::error::{Error, Result};
use orchestrator_common::types::{DeviceId, ResourceDescriptor, SourceId, Task};
use orchestrator_core::transport::NodeForwarder;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

/// Maps a device id to the base URL of its Controller/Scheduler HTTP
/// surface, e.g. `"edge-1" -> "http://10.0.0.2:8080"`.
#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    endpoints: HashMap<DeviceId, String>,
}

impl NodeDirectory {
    pub fn new(endpoints: HashMap<DeviceId, String>) -> Self {
        Self { endpoints }
    }

    pub fn endpoint(&self, device: &DeviceId) -> Result<&str> {
        self.endpoints
            .get(device)
            .map(String::as_str)
            .ok_or_else(|| Error::UpstreamUnavailable(format!("no endpoint configured for device {device}")))
    }
}

/// Forwards a task to another device's Controller over HTTP, symmetric
/// with the endpoint this node itself exposes.
pub struct HttpNodeForwarder {
    client: reqwest::Client,
    directory: NodeDirectory,
}

impl HttpNodeForwarder {
    pub fn new(directory: NodeDirectory, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_default();
        Self { client, directory }
    }
}

#[async_trait]
impl NodeForwarder for HttpNodeForwarder {
    #[instrument(skip(self, task), fields(source_id = task.source_id, task_id = task.task_id, device))]
    async fn forward(&self, device: &DeviceId, task: Task) -> Result<Task> {
        let endpoint = self.directory.endpoint(device)?;
        let url = format!("{endpoint}/controller/process");

        let response = self.client.post(&url).json(&task).send().await?;
        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "device {device} returned status {}",
                response.status()
            )));
        }

        Ok(response.json::<Task>().await?)
    }
}

/// Pushes local scheduler observations (completed-task delay, device
/// resource descriptors) to the Scheduler's internal endpoints.
pub struct SchedulerClient {
    client: reqwest::Client,
    base_url: String,
}

impl SchedulerClient {
    pub fn new(base_url: String, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    pub async fn push_scenario(&self, source_id: SourceId, delay_seconds: f64) -> Result<()> {
        #[derive(serde::Serialize)]
        struct ScenarioUpdate {
            source_id: SourceId,
            delay_seconds: f64,
        }

        self.client
            .post(format!("{}/scenario", self.base_url))
            .json(&ScenarioUpdate { source_id, delay_seconds })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn push_resource(&self, device: DeviceId, descriptor: ResourceDescriptor) -> Result<()> {
        #[derive(serde::Serialize)]
        struct ResourceUpdate {
            device: DeviceId,
            descriptor: ResourceDescriptor,
        }

        self.client
            .post(format!("{}/resource", self.base_url))
            .json(&ResourceUpdate { device, descriptor })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_common::types::{Dag, PriorityCoefficients};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_task() -> Task {
        Task::new(1, 1, Dag::new(), Default::default(), Default::default(), "c.bin".to_string(), 0, PriorityCoefficients::default())
    }

    #[tokio::test]
    async fn forward_round_trips_task_through_remote_controller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/controller/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_task()))
            .mount(&server)
            .await;

        let mut endpoints = HashMap::new();
        endpoints.insert("cloud".to_string(), server.uri());
        let forwarder = HttpNodeForwarder::new(NodeDirectory::new(endpoints), Duration::from_secs(1));

        let result = forwarder.forward(&"cloud".to_string(), sample_task()).await.unwrap();
        assert_eq!(result.task_id, 1);
    }

    #[tokio::test]
    async fn forward_to_unknown_device_fails_fast() {
        let forwarder = HttpNodeForwarder::new(NodeDirectory::default(), Duration::from_secs(1));
        let err = forwarder.forward(&"ghost".to_string(), sample_task()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }
}
