use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use swarm_core::models::{CreateWorkflowInput, WorkflowWithTasks};
use swarm_core::state::AppState;
use swarm_core::SwarmError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/{id}", get(get_workflow))
        .route("/{id}/cancel", post(cancel_workflow))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateWorkflowQuery {
    user_id: String,
}

/// POST /api/v1/workflows?user_id=... - persist the workflow and its seed
/// task, then start the routing loop in the background.
pub(crate) async fn create_workflow(
    State(state): State<AppState>,
    Query(query): Query<CreateWorkflowQuery>,
    Json(body): Json<CreateWorkflowInput>,
) -> Result<Json<WorkflowWithTasks>, SwarmError> {
    let submission = state.orchestrator.submit(&query.user_id, body).await?;
    // The loop keeps running after the handle is dropped.
    Ok(Json(submission.workflow))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListWorkflowsQuery {
    user_id: Option<String>,
}

pub(crate) async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Result<Json<serde_json::Value>, SwarmError> {
    let workflows = state.workflow_store.list(query.user_id.as_deref()).await?;
    Ok(Json(serde_json::json!({ "workflows": workflows })))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowWithTasks>, SwarmError> {
    state
        .workflow_store
        .get_with_tasks(&id)
        .await?
        .map(Json)
        .ok_or_else(|| SwarmError::NotFound(format!("Workflow {} not found", id)))
}

async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, SwarmError> {
    let cancelled = state.orchestrator.cancel(&id).await?;
    Ok(Json(serde_json::json!({ "workflow_id": id, "cancelled": cancelled })))
}
