//! Integration tests for the REST API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`
//! against an in-memory database and a scripted completion client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use swarm_core::state::{AppState, AppStateInner};
use swarm_core::{ChatMessage, CompletionClient, CompletionError, Database, SwarmConfig};
use swarm_server::build_router;

struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "FINISH".to_string()))
    }
}

fn test_app(replies: &[&str]) -> (Router, AppState) {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let client = Arc::new(ScriptedClient {
        replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
    });
    let state: AppState = Arc::new(AppStateInner::new(db, SwarmConfig::default(), client));
    (build_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_user(app: &Router, email: &str) -> String {
    let (status, body) = send(app, "POST", &format!("/api/v1/users?email={}", email), None).await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

/// Poll until the workflow reaches a terminal status.
async fn wait_for_terminal(app: &Router, workflow_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, "GET", &format!("/api/v1/workflows/{}", workflow_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow {} never finished", workflow_id);
}

#[tokio::test]
async fn test_health_and_root() {
    let (app, _) = test_app(&[]);
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "swarm-server");

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["status"].as_str().unwrap().contains("SwarmOS"));
}

#[tokio::test]
async fn test_create_user_is_idempotent_by_email() {
    let (app, _) = test_app(&[]);
    let (status, first) = send(&app, "POST", "/api/v1/users?email=ada@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "created");

    let (_, second) = send(&app, "POST", "/api/v1/users?email=ada@example.com", None).await;
    assert_eq!(second["status"], "exists");
    assert_eq!(second["id"], first["id"]);

    let (status, user) = send(
        &app,
        "GET",
        &format!("/api/v1/users/{}", first["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "ada@example.com");
}

#[tokio::test]
async fn test_create_user_requires_email() {
    let (app, _) = test_app(&[]);
    let (status, _) = send(&app, "POST", "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_workflow_runs_to_completion() {
    let (app, _) = test_app(&["Coder", "fn main() {}", "FINISH"]);
    let user_id = create_user(&app, "dev@example.com").await;

    let (status, created) = send(
        &app,
        "POST",
        &format!("/api/v1/workflows?user_id={}", user_id),
        Some(serde_json::json!({
            "title": "CLI",
            "initial_prompt": "Build a CLI tool"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["title"], "CLI");
    assert_eq!(created["user_id"], user_id.as_str());
    assert_eq!(created["tasks"], serde_json::json!([]));

    let done = wait_for_terminal(&app, created["id"].as_str().unwrap()).await;
    assert_eq!(done["status"], "completed");
    let tasks = done["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["assigned_agent"], "User");
    assert_eq!(tasks[0]["title"], "Initial Request");
    assert_eq!(tasks[0]["input_payload"]["prompt"], "Build a CLI tool");
    assert_eq!(tasks[1]["assigned_agent"], "Coder");
    assert_eq!(tasks[1]["status"], "completed");
    assert_eq!(tasks[1]["output_payload"]["result"], "fn main() {}");
}

#[tokio::test]
async fn test_unknown_workflow_is_404() {
    let (app, _) = test_app(&[]);
    let (status, body) = send(&app, "GET", "/api/v1/workflows/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));

    let (status, _) = send(&app, "POST", "/api/v1/workflows/does-not-exist/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submission_is_validated() {
    let (app, _) = test_app(&[]);
    let user_id = create_user(&app, "dev@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/workflows?user_id=nobody",
        Some(serde_json::json!({ "title": "T", "initial_prompt": "p" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/workflows?user_id={}", user_id),
        Some(serde_json::json!({ "title": "", "initial_prompt": "p" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn test_list_workflows_filters_by_user() {
    let (app, state) = test_app(&[]);
    let alice = create_user(&app, "alice@example.com").await;
    let bob = create_user(&app, "bob@example.com").await;

    for (user, title) in [(&alice, "A1"), (&alice, "A2"), (&bob, "B1")] {
        let (status, created) = send(
            &app,
            "POST",
            &format!("/api/v1/workflows?user_id={}", user),
            Some(serde_json::json!({ "title": title, "initial_prompt": "go" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        wait_for_terminal(&app, created["id"].as_str().unwrap()).await;
    }

    let (status, body) = send(&app, "GET", &format!("/api/v1/workflows?user_id={}", alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["workflows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"A1") && titles.contains(&"A2"));

    let (_, all) = send(&app, "GET", "/api/v1/workflows", None).await;
    assert_eq!(all["workflows"].as_array().unwrap().len(), 3);
    assert_eq!(state.workflow_store.list(Some(&bob)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_finished_workflow_reports_false() {
    let (app, _) = test_app(&[]);
    let user_id = create_user(&app, "dev@example.com").await;
    let (_, created) = send(
        &app,
        "POST",
        &format!("/api/v1/workflows?user_id={}", user_id),
        Some(serde_json::json!({ "title": "Quick", "initial_prompt": "nothing to do" })),
    )
    .await;
    let id = created["id"].as_str().unwrap();
    wait_for_terminal(&app, id).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/workflows/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn test_collection_routes_accept_trailing_slash() {
    let (app, _) = test_app(&[]);
    let (status, user) = send(&app, "POST", "/api/v1/users/?email=slash@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["status"], "created");
    let user_id = user["id"].as_str().unwrap();

    let (status, created) = send(
        &app,
        "POST",
        &format!("/api/v1/workflows/?user_id={}", user_id),
        Some(serde_json::json!({ "title": "Slash", "initial_prompt": "go" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["title"], "Slash");
    wait_for_terminal(&app, created["id"].as_str().unwrap()).await;

    let (status, body) = send(&app, "GET", "/api/v1/workflows/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workflows"].as_array().unwrap().len(), 1);
}
