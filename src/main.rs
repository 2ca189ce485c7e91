//! Edge-cloud workload orchestrator entry point.

use anyhow::Result;
use orchestrator_common::types::{Dag, PriorityCoefficients, Service, ServiceBinding, Stage};
use orchestrator_common::{telemetry, Config};
use orchestrator_engine::{
    control_http, ControlPlane, Controller, Generator, PassthroughProcessor, PetgraphDagModel, PeriodicChunkSource,
};
use orchestrator_store::{router, DistributorState, SqliteDistributor};
use orchestrator_transport::{HttpNodeForwarder, NodeDirectory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

const EDGE_DEVICE: &str = "edge-1";
const CLOUD_DEVICE: &str = "cloud";

/// A single-stage template: a stand-in pipeline for sources that don't
/// carry their own DAG submission yet, exercising the full
/// generate -> schedule -> drive -> distribute path end to end.
fn demo_dag_template() -> Dag {
    let mut dag = Dag::new();
    dag.add_stage(Stage {
        id: "process".to_string(),
        prev: vec![],
        succ: vec![],
        service: Service::new(
            ServiceBinding { name: "process".to_string(), input: "chunk".to_string(), output: "result".to_string() },
            EDGE_DEVICE.to_string(),
        ),
    });
    dag.start = vec!["process".to_string()];
    dag
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        std::process::exit(1);
    }

    telemetry::init_telemetry(&config.observability)?;
    orchestrator_common::metrics::init_metrics();

    info!("starting edge-orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let distributor: Arc<dyn orchestrator_core::distributor::Distributor> =
        Arc::new(SqliteDistributor::connect(&config.distributor).await?);

    let control_plane = Arc::new(ControlPlane::new(
        config.aimd,
        config.startup_policy.clone(),
        EDGE_DEVICE.to_string(),
        CLOUD_DEVICE.to_string(),
    ));
    control_plane.register_source(1, config.priority.deadline_seconds);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    // Single-process deployment: the cloud device's Controller is this
    // same server, reached over loopback like any other device would be.
    let mut node_endpoints = HashMap::new();
    node_endpoints.insert(CLOUD_DEVICE.to_string(), format!("http://{addr}"));
    let forwarder = Arc::new(HttpNodeForwarder::new(NodeDirectory::new(node_endpoints), Duration::from_secs(5)));

    let controller = Arc::new(Controller::new(
        EDGE_DEVICE.to_string(),
        Arc::new(PassthroughProcessor),
        forwarder,
        distributor.clone(),
    ));

    let app = router(DistributorState { distributor: distributor.clone() })
        .merge(control_http::router(control_plane.clone(), controller.clone()));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "internal distributor/controller surface listening");

    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(%err, "http server exited");
        }
    });

    let dag_model = Arc::new(PetgraphDagModel::new(64));
    let priority_coefficients = PriorityCoefficients {
        importance_weight: config.priority.importance_weight,
        urgency_weight: config.priority.urgency_weight,
        priority_levels: config.priority.priority_levels,
        deadline_seconds: config.priority.deadline_seconds,
    };
    let (task_tx, mut task_rx) = mpsc::channel(64);
    let (stop_tx, stop_rx) = watch::channel(false);

    let generator = Generator::new(
        1,
        PeriodicChunkSource::new(Duration::from_millis(1000)),
        demo_dag_template(),
        orchestrator_common::types::Metadata::new(),
        priority_coefficients,
        0,
        control_plane.clone(),
        dag_model,
        task_tx,
        stop_rx,
    );
    let mut next_task_id: i64 = 0;
    let generator_handle = tokio::spawn(generator.run(
        orchestrator_engine::compute_rate_mode(1.0, 1.0),
        || {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64()
        },
        move || {
            next_task_id += 1;
            next_task_id
        },
    ));

    let controller_for_drive = controller.clone();
    let drive_handle = tokio::spawn(async move {
        while let Some(task) = task_rx.recv().await {
            let controller = controller_for_drive.clone();
            tokio::spawn(async move {
                if let Err(err) = controller
                    .drive(task, || {
                        std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_secs_f64()
                    })
                    .await
                {
                    tracing::warn!(%err, "task failed to drive to completion");
                }
            });
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down edge-orchestrator");
    let _ = stop_tx.send(true);
    generator_handle.abort();
    drive_handle.abort();
    server.abort();
    telemetry::shutdown_telemetry();

    Ok(())
}
