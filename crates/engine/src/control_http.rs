//! Internal HTTP surface for the control plane: the `/scenario` and
//! `/resource` endpoints `SchedulerClient` pushes to, a `/resources`
//! snapshot for operator tooling, and `/controller/process` — the
//! endpoint `HttpNodeForwarder` targets on every cross-device hop.

use crate::{ControlPlane, Controller};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use orchestrator_common::types::{DeviceId, ResourceDescriptor, SourceId, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn router(control_plane: Arc<ControlPlane>, controller: Arc<Controller>) -> Router {
    let control_plane_routes = Router::new()
        .route("/scenario", post(push_scenario))
        .route("/resource", post(push_resource))
        .route("/resources", get(resource_snapshot))
        .with_state(control_plane);

    let controller_routes = Router::new().route("/controller/process", post(process_task)).with_state(controller);

    control_plane_routes.merge(controller_routes)
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

async fn process_task(State(controller): State<Arc<Controller>>, Json(task): Json<Task>) -> Result<Json<Task>, StatusCode> {
    controller
        .drive(task, unix_now)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize)]
struct ScenarioUpdate {
    source_id: SourceId,
    delay_seconds: f64,
}

#[derive(Serialize)]
struct Ack {
    state: &'static str,
}

async fn push_scenario(State(control_plane): State<Arc<ControlPlane>>, Json(update): Json<ScenarioUpdate>) -> Json<Ack> {
    control_plane.on_scenario_update(update.source_id, update.delay_seconds);
    Json(Ack { state: "recorded" })
}

#[derive(Deserialize)]
struct ResourceUpdate {
    device: DeviceId,
    descriptor: ResourceDescriptor,
}

async fn push_resource(State(control_plane): State<Arc<ControlPlane>>, Json(update): Json<ResourceUpdate>) -> Json<Ack> {
    control_plane.on_resource_update(update.device, update.descriptor);
    Json(Ack { state: "recorded" })
}

async fn resource_snapshot(State(control_plane): State<Arc<ControlPlane>>) -> Json<HashMap<DeviceId, ResourceDescriptor>> {
    Json(control_plane.resource_snapshot())
}
