pub mod progress;
pub mod users;
pub mod workflows;

use axum::routing::{get, post};
use axum::Router;

use swarm_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/workflows", workflows::router())
        .nest("/api/v1", progress::router())
        // Collection paths are also reachable with a trailing slash, the form
        // the web frontend requests.
        .route("/api/v1/users/", post(users::create_user))
        .route(
            "/api/v1/workflows/",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
}
