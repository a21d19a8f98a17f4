use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use swarm_core::models::User;
use swarm_core::state::AppState;
use swarm_core::SwarmError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/{id}", get(get_user))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserQuery {
    email: String,
}

/// POST /api/v1/users?email=... - find or create a user by email.
pub(crate) async fn create_user(
    State(state): State<AppState>,
    Query(query): Query<CreateUserQuery>,
) -> Result<Json<serde_json::Value>, SwarmError> {
    let (user, created) = state.user_store.find_or_create(&query.email).await?;
    let status = if created { "created" } else { "exists" };
    Ok(Json(serde_json::json!({ "id": user.id, "status": status })))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, SwarmError> {
    state
        .user_store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| SwarmError::NotFound(format!("User {} not found", id)))
}
