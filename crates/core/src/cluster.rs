//! Container-orchestrator driver seam.
//!
//! The real cluster driver (Kubernetes, a local container runtime, ...)
//! is out of scope; this trait and an in-memory stub exist only so the
//! install/uninstall timeout behaviour can be exercised without
//! shelling out to a real cluster.

use async_trait::async_trait;
use orchestrator_common::error::Result;
use std::time::Duration;

#[async_trait]
pub trait ClusterDriver: Send + Sync {
    async fn install(&self, workload: &str, timeout: Duration) -> Result<()>;
    async fn uninstall(&self, workload: &str, timeout: Duration) -> Result<()>;
}
