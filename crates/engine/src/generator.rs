//! Per-source Generator: pulls data chunks at a paced rate, builds
//! tasks, and hands them to a Controller.

use crate::ControlPlane;
use async_trait::async_trait;
use orchestrator_common::error::Result;
use orchestrator_common::types::{Dag, Metadata, PriorityCoefficients, SourceId, Task, TAG_TOTAL};
use orchestrator_core::dag::DagModel;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument};

/// Produces raw data chunks for one source, out of scope for framing
/// details (sensor decoding is an external collaborator); only the
/// chunk count and metadata matter to the generator loop.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn next_chunk(&self) -> Result<(String, Metadata)>;
}

/// How the getter thins frames when the raw capture rate exceeds the
/// target rate the scheduler asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::missing_docs_in_private_items)]
pub enum RateMode {
    /// Keep every frame (raw rate already at or below target).
    Keep,
    /// Drop every `interval`-th frame.
    Skip { interval: u32 },
    /// Keep only every `interval`-th frame.
    Remain { interval: u32 },
}

/// Chooses skip-mode or remain-mode thinning for `raw_fps -> target_fps`,
/// branching on `target >= raw / 2`.
pub fn compute_rate_mode(raw_fps: f64, target_fps: f64) -> RateMode {
    if target_fps <= 0.0 || target_fps >= raw_fps {
        return RateMode::Keep;
    }
    if target_fps >= raw_fps / 2.0 {
        let interval = (raw_fps / (raw_fps - target_fps)).round().max(1.0) as u32;
        RateMode::Skip { interval }
    } else {
        let interval = (raw_fps / target_fps).floor().max(1.0) as u32;
        RateMode::Remain { interval }
    }
}

/// Per-source generator loop: pulls one chunk at a time, applies the
/// rate plan, and emits tasks onto `output` until `stop` fires.
pub struct Generator<S: ChunkSource> {
    source_id: SourceId,
    source: S,
    dag_template: Dag,
    /// Static snapshot of the source's declared defaults, attached to
    /// every task as `raw_metadata`; distinct from the per-chunk
    /// `metadata` the source reports on each pull.
    raw_metadata: Metadata,
    priority_coefficients: PriorityCoefficients,
    source_importance: u32,
    control_plane: Arc<ControlPlane>,
    dag_model: Arc<dyn DagModel>,
    output: mpsc::Sender<Task>,
    stop: watch::Receiver<bool>,
}

impl<S: ChunkSource> Generator<S> {
    pub fn new(
        source_id: SourceId,
        source: S,
        dag_template: Dag,
        raw_metadata: Metadata,
        priority_coefficients: PriorityCoefficients,
        source_importance: u32,
        control_plane: Arc<ControlPlane>,
        dag_model: Arc<dyn DagModel>,
        output: mpsc::Sender<Task>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source_id,
            source,
            dag_template,
            raw_metadata,
            priority_coefficients,
            source_importance,
            control_plane,
            dag_model,
            output,
            stop,
        }
    }

    #[instrument(skip(self, now), fields(source_id = self.source_id))]
    pub async fn run(mut self, rate_mode: RateMode, mut now: impl FnMut() -> f64, mut next_task_id: impl FnMut() -> i64) {
        let mut counter: u64 = 0;
        loop {
            if *self.stop.borrow() {
                info!(source_id = self.source_id, "generator stopping");
                return;
            }

            let (file_path, metadata) = match self.source.next_chunk().await {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(source_id = self.source_id, %err, "chunk source failed");
                    continue;
                }
            };

            counter += 1;
            if !should_emit(rate_mode, counter) {
                continue;
            }

            let dag = self.control_plane.place_dag(self.dag_model.as_ref(), self.source_id, &self.dag_template);

            let mut task = Task::new(
                self.source_id,
                next_task_id(),
                dag,
                metadata,
                self.raw_metadata.clone(),
                file_path,
                self.source_importance,
                self.priority_coefficients,
            );
            task.record_timestamp(TAG_TOTAL, false, now());

            if self.output.send(task).await.is_err() {
                info!(source_id = self.source_id, "controller channel closed, generator exiting");
                return;
            }
        }
    }
}

/// Polls a fixed interval and hands back an incrementing synthetic
/// chunk reference; real sensor capture is an external collaborator,
/// so this stands in for it wherever a source isn't otherwise wired up.
pub struct PeriodicChunkSource {
    interval: tokio::time::Duration,
    counter: std::sync::atomic::AtomicU64,
}

impl PeriodicChunkSource {
    pub fn new(interval: tokio::time::Duration) -> Self {
        Self { interval, counter: std::sync::atomic::AtomicU64::new(0) }
    }
}

#[async_trait]
impl ChunkSource for PeriodicChunkSource {
    async fn next_chunk(&self) -> Result<(String, Metadata)> {
        tokio::time::sleep(self.interval).await;
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok((format!("chunk-{n}.bin"), Metadata::new()))
    }
}

/// Whether the `counter`-th pulled chunk should be emitted under `mode`.
fn should_emit(mode: RateMode, counter: u64) -> bool {
    match mode {
        RateMode::Keep => true,
        RateMode::Skip { interval } => interval == 0 || counter % u64::from(interval) != 0,
        RateMode::Remain { interval } => interval != 0 && counter % u64::from(interval) == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PetgraphDagModel;
    use orchestrator_common::config::{AimdConfig, StartupPolicyConfig};
    use orchestrator_common::types::{Service, ServiceBinding, Stage};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChunkSource for CountingSource {
        async fn next_chunk(&self) -> Result<(String, Metadata)> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            let mut metadata = Metadata::new();
            metadata.insert("seq".to_string(), serde_json::Value::from(n));
            Ok((format!("chunk-{n}.bin"), metadata))
        }
    }

    fn single_stage_dag() -> Dag {
        let mut dag = Dag::new();
        dag.add_stage(Stage {
            id: "process".to_string(),
            prev: vec![],
            succ: vec![],
            service: Service::new(
                ServiceBinding { name: "process".to_string(), input: "chunk".to_string(), output: "result".to_string() },
                "edge-1".to_string(),
            ),
        });
        dag.start = vec!["process".to_string()];
        dag
    }

    #[tokio::test]
    async fn raw_metadata_stays_the_configured_default_not_the_per_chunk_value() {
        let control_plane = Arc::new(ControlPlane::new(
            AimdConfig::default(),
            StartupPolicyConfig::default(),
            "edge-1".to_string(),
            "cloud".to_string(),
        ));
        let dag_model: Arc<dyn DagModel> = Arc::new(PetgraphDagModel::new(8));
        let (tx, mut rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut raw_metadata = Metadata::new();
        raw_metadata.insert("source".to_string(), serde_json::Value::from("camera-1"));

        let generator = Generator::new(
            1,
            CountingSource { calls: AtomicU32::new(0) },
            single_stage_dag(),
            raw_metadata.clone(),
            PriorityCoefficients::default(),
            0,
            control_plane,
            dag_model,
            tx,
            stop_rx,
        );

        let mut counter = 0i64;
        tokio::spawn(generator.run(RateMode::Keep, || 0.0, move || {
            counter += 1;
            counter
        }));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let _ = stop_tx.send(true);

        assert_eq!(first.raw_metadata, raw_metadata);
        assert_eq!(second.raw_metadata, raw_metadata);
        assert_ne!(first.metadata, second.metadata);
    }

    #[test]
    fn keeps_everything_when_target_meets_raw() {
        assert_eq!(compute_rate_mode(30.0, 30.0), RateMode::Keep);
        assert_eq!(compute_rate_mode(30.0, 40.0), RateMode::Keep);
    }

    #[test]
    fn uses_skip_mode_when_target_at_least_half_raw() {
        match compute_rate_mode(30.0, 20.0) {
            RateMode::Skip { interval } => assert!(interval >= 1),
            other => panic!("expected skip mode, got {other:?}"),
        }
    }

    #[test]
    fn uses_remain_mode_when_target_below_half_raw() {
        let mode = compute_rate_mode(30.0, 10.0);
        assert_eq!(mode, RateMode::Remain { interval: 3 });
    }

    #[test]
    fn remain_mode_keeps_every_nth_chunk() {
        let mode = RateMode::Remain { interval: 3 };
        let emitted: Vec<u64> = (1..=9).filter(|&c| should_emit(mode, c)).collect();
        assert_eq!(emitted, vec![3, 6, 9]);
    }
}
