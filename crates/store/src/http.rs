//! Internal HTTP surface over the distributor: `POST /result`,
//! `GET /file`, `GET /all_result`, `POST /clear`.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use orchestrator_common::types::{Record, SourceId, Task, TaskId};
use orchestrator_core::distributor::Distributor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct DistributorState {
    pub distributor: Arc<dyn Distributor>,
}

pub fn router(state: DistributorState) -> Router {
    Router::new()
        .route("/result", post(save_result))
        .route("/all_result", get(all_results))
        .route("/file", get(file_result))
        .route("/clear", post(clear))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
struct SaveResultRequest {
    task: Task,
}

#[derive(Serialize)]
struct SaveResultResponse {
    state: &'static str,
}

async fn save_result(
    State(state): State<DistributorState>,
    Json(req): Json<SaveResultRequest>,
) -> Json<SaveResultResponse> {
    match state.distributor.save(&req.task).await {
        Ok(()) => Json(SaveResultResponse { state: "saved" }),
        Err(_) => Json(SaveResultResponse { state: "duplicate" }),
    }
}

#[derive(Serialize)]
struct AllResultsResponse {
    records: Vec<Record>,
}

async fn all_results(State(state): State<DistributorState>) -> Json<AllResultsResponse> {
    let records = state.distributor.query_all().await.unwrap_or_default();
    Json(AllResultsResponse { records })
}

#[derive(Deserialize)]
struct FileQuery {
    source_id: SourceId,
    task_id: TaskId,
}

#[derive(Serialize)]
struct FileResponse {
    found: bool,
    record: Option<Record>,
}

async fn file_result(State(state): State<DistributorState>, Query(query): Query<FileQuery>) -> Json<FileResponse> {
    let record = state
        .distributor
        .query_all()
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|r| r.source_id == query.source_id && r.task_id == query.task_id);

    Json(FileResponse {
        found: record.is_some(),
        record,
    })
}

#[derive(Serialize)]
struct ClearResponse {
    state: &'static str,
}

async fn clear(State(state): State<DistributorState>) -> Json<ClearResponse> {
    let state_str = match state.distributor.clear().await {
        Ok(()) => "cleared",
        Err(_) => "error",
    };
    Json(ClearResponse { state: state_str })
}
