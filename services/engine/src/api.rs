//! HTTP API
//!
//! Capability checks, queue submission for subnet lifecycle operations and
//! task observation. Actions the capability gate denies are answered with 409
//! and never reach the queue.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agents::queue::{QueueError, TaskHandle, WorkerPool};
use crate::agents::subnet::{
    CloudSubnet, DispatchError, LifecycleAction, ManagerRegistry, SubnetDispatcher,
    SubnetOptions, SubnetRepository, Verdict,
};

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub subnets: Arc<dyn SubnetRepository>,
    pub managers: ManagerRegistry,
    pub dispatcher: SubnetDispatcher,
    pub pool: WorkerPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/cloud_subnets", get(list_subnets).post(create_subnet))
        .route(
            "/api/cloud_subnets/:id",
            get(get_subnet).patch(update_subnet).delete(delete_subnet),
        )
        .route("/api/cloud_subnets/:id/supports/:action", get(supports))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (
        status,
        Json(json!({"status": "error", "message": message.into()})),
    )
}

fn denied(verdict: &Verdict) -> ApiResponse {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "status": "unsupported",
            "action": verdict.action(),
            "reasons": verdict.reasons(),
            "message": verdict.unsupported_reason(),
        })),
    )
}

fn queued(handle: TaskHandle) -> ApiResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "queued", "task_id": handle.id()})),
    )
}

fn dispatch_failed(err: DispatchError) -> ApiResponse {
    warn!(error = %err, "Failed to queue cloud subnet operation");
    let status = match &err {
        DispatchError::NoActiveConnection { .. } => StatusCode::CONFLICT,
        DispatchError::Queue(
            QueueError::NoWorkers { .. } | QueueError::Full { .. } | QueueError::Closed { .. },
        ) => StatusCode::SERVICE_UNAVAILABLE,
    };
    error(status, err.to_string())
}

async fn find_subnet(state: &AppState, id: u64) -> Result<CloudSubnet, ApiResponse> {
    state
        .subnets
        .find(id)
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Cloud subnet {} not found", id)))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "lornu-network-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_subnets(State(state): State<AppState>) -> Json<Value> {
    let subnets: Vec<_> = state.subnets.all().await.iter().map(CloudSubnet::summary).collect();
    Json(json!({"cloud_subnets": subnets, "count": subnets.len()}))
}

async fn get_subnet(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResponse {
    match find_subnet(&state, id).await {
        Ok(subnet) => (StatusCode::OK, Json(json!(subnet.summary()))),
        Err(response) => response,
    }
}

async fn supports(
    State(state): State<AppState>,
    Path((id, action)): Path<(u64, String)>,
) -> ApiResponse {
    let action: LifecycleAction = match action.parse() {
        Ok(action) => action,
        Err(message) => return error(StatusCode::BAD_REQUEST, message),
    };
    let subnet = match find_subnet(&state, id).await {
        Ok(subnet) => subnet,
        Err(response) => return response,
    };

    let verdict = subnet.supports(action);
    (
        StatusCode::OK,
        Json(json!({
            "action": action,
            "supported": verdict.is_supported(),
            "reasons": verdict.reasons(),
            "message": verdict.unsupported_reason(),
        })),
    )
}

#[derive(Debug, Deserialize)]
struct CreateSubnetRequest {
    userid: String,
    manager_id: u64,
    #[serde(default)]
    options: SubnetOptions,
}

async fn create_subnet(
    State(state): State<AppState>,
    Json(req): Json<CreateSubnetRequest>,
) -> ApiResponse {
    let Some(manager) = state.managers.get(req.manager_id) else {
        return error(
            StatusCode::NOT_FOUND,
            format!("Network manager {} not found", req.manager_id),
        );
    };

    let verdict = CloudSubnet::supports_create();
    if !verdict.is_supported() {
        return denied(&verdict);
    }

    info!(manager_id = req.manager_id, userid = %req.userid, "Create cloud subnet requested");
    match state
        .dispatcher
        .create_cloud_subnet_queue(manager.as_ref(), &req.userid, req.options)
        .await
    {
        Ok(handle) => queued(handle),
        Err(e) => dispatch_failed(e),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSubnetRequest {
    userid: String,
    #[serde(default)]
    options: SubnetOptions,
}

async fn update_subnet(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateSubnetRequest>,
) -> ApiResponse {
    let subnet = match find_subnet(&state, id).await {
        Ok(subnet) => subnet,
        Err(response) => return response,
    };

    let verdict = subnet.supports(LifecycleAction::Update);
    if !verdict.is_supported() {
        return denied(&verdict);
    }

    match state
        .dispatcher
        .update_cloud_subnet_queue(&subnet, &req.userid, req.options)
        .await
    {
        Ok(handle) => queued(handle),
        Err(e) => dispatch_failed(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    userid: String,
}

async fn delete_subnet(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(params): Query<DeleteParams>,
) -> ApiResponse {
    let subnet = match find_subnet(&state, id).await {
        Ok(subnet) => subnet,
        Err(response) => return response,
    };

    let verdict = subnet.supports(LifecycleAction::Delete);
    if !verdict.is_supported() {
        return denied(&verdict);
    }

    match state
        .dispatcher
        .delete_cloud_subnet_queue(&subnet, &params.userid)
        .await
    {
        Ok(handle) => queued(handle),
        Err(e) => dispatch_failed(e),
    }
}

async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    let tasks = state.pool.list_tasks().await;
    Json(json!({"tasks": tasks, "count": tasks.len()}))
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    match state.pool.task(&id).await {
        Some(task) => (StatusCode::OK, Json(json!(task))),
        None => error(StatusCode::NOT_FOUND, format!("Task {} not found", id)),
    }
}
