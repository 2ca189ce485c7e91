//! In-memory `ClusterDriver` stub: exercises the install/uninstall
//! timeout behavior without shelling out to a real container
//! orchestrator.

use async_trait::async_trait;
use dashmap::DashSet;
use orchestrator_common::error::{Error, Result};
use orchestrator_core::cluster::ClusterDriver;
use std::time::Duration;
use tracing::{info, instrument};

pub struct InMemoryClusterDriver {
    installed: DashSet<String>,
    simulated_latency: Duration,
}

impl InMemoryClusterDriver {
    pub fn new(simulated_latency: Duration) -> Self {
        Self {
            installed: DashSet::new(),
            simulated_latency,
        }
    }

    pub fn is_installed(&self, workload: &str) -> bool {
        self.installed.contains(workload)
    }
}

#[async_trait]
impl ClusterDriver for InMemoryClusterDriver {
    #[instrument(skip(self))]
    async fn install(&self, workload: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, tokio::time::sleep(self.simulated_latency))
            .await
            .map_err(|_| Error::Timeout(format!("installing {workload} exceeded {timeout:?}")))?;
        self.installed.insert(workload.to_string());
        info!(workload, "workload installed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn uninstall(&self, workload: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, tokio::time::sleep(self.simulated_latency))
            .await
            .map_err(|_| Error::Timeout(format!("uninstalling {workload} exceeded {timeout:?}")))?;
        self.installed.remove(workload);
        info!(workload, "workload uninstalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_then_uninstall_round_trips() {
        let driver = InMemoryClusterDriver::new(Duration::from_millis(1));
        driver.install("demo", Duration::from_secs(1)).await.unwrap();
        assert!(driver.is_installed("demo"));

        driver.uninstall("demo", Duration::from_secs(1)).await.unwrap();
        assert!(!driver.is_installed("demo"));
    }

    #[tokio::test]
    async fn install_past_deadline_times_out() {
        let driver = InMemoryClusterDriver::new(Duration::from_millis(50));
        let err = driver.install("demo", Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(!driver.is_installed("demo"));
    }
}
