//! Prometheus metrics for the orchestrator runtime.

use crate::error::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec, Registry,
};

/// Global metrics registry.
pub static METRICS_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Task end-to-end latency, labeled by source.
pub static TASK_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "orchestrator_task_latency_seconds",
        "End-to-end task latency in seconds",
        &["source_id"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

/// Current pipeline segmentation point per source (AIMD `pipe_seg`).
pub static PIPE_SEGMENT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "orchestrator_pipe_segment",
        "Index of the cloud cut-over stage chosen by the AIMD scheduler",
        &["source_id"]
    )
    .unwrap()
});

/// Priority queue depth, labeled by node/service/priority level.
pub static QUEUE_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "orchestrator_queue_depth",
        "Number of tasks waiting in a priority queue",
        &["node", "service", "priority"]
    )
    .unwrap()
});

/// Distributor record count.
pub static DISTRIBUTOR_RECORDS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "orchestrator_distributor_records",
        "Number of records currently stored in the distributor",
        &["source_id"]
    )
    .unwrap()
});

/// Config-bound instance cache size.
pub static CACHE_SIZE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "orchestrator_cache_size",
        "Number of live instances held by the config-bound cache",
        &["namespace"]
    )
    .unwrap()
});

/// Error counter.
pub static ERROR_COUNTER: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orchestrator_errors_total",
        "Total number of errors",
        &["error_type", "severity"]
    )
    .unwrap()
});

/// Register all metrics with the global registry. Idempotent at process
/// scope; call once during startup.
pub fn init_metrics() -> Result<()> {
    METRICS_REGISTRY.register(Box::new(TASK_LATENCY.clone()))?;
    METRICS_REGISTRY.register(Box::new(PIPE_SEGMENT.clone()))?;
    METRICS_REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    METRICS_REGISTRY.register(Box::new(DISTRIBUTOR_RECORDS.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_SIZE.clone()))?;
    METRICS_REGISTRY.register(Box::new(ERROR_COUNTER.clone()))?;
    Ok(())
}

/// Narrow surface for components that only need to emit metrics, so
/// call sites don't depend on the global statics directly.
pub trait MetricsCollector {
    fn record_task_latency(&self, source_id: &str, duration_secs: f64);
    fn set_pipe_segment(&self, source_id: &str, segment: u32);
    fn set_queue_depth(&self, node: &str, service: &str, priority: u32, depth: usize);
    fn record_error(&self, error_type: &str, severity: &str);
}

#[derive(Clone, Default)]
pub struct DefaultMetricsCollector;

impl MetricsCollector for DefaultMetricsCollector {
    fn record_task_latency(&self, source_id: &str, duration_secs: f64) {
        TASK_LATENCY.with_label_values(&[source_id]).observe(duration_secs);
    }

    fn set_pipe_segment(&self, source_id: &str, segment: u32) {
        PIPE_SEGMENT.with_label_values(&[source_id]).set(f64::from(segment));
    }

    fn set_queue_depth(&self, node: &str, service: &str, priority: u32, depth: usize) {
        QUEUE_DEPTH
            .with_label_values(&[node, service, &priority.to_string()])
            .set(depth as f64);
    }

    fn record_error(&self, error_type: &str, severity: &str) {
        ERROR_COUNTER.with_label_values(&[error_type, severity]).inc();
    }
}
