//! Integration tests for the swarm-cli commands.
//!
//! These tests exercise the same code paths as the binary, using
//! in-memory SQLite databases and a scripted completion client.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use swarm_cli::commands::{self, ConfigOverrides};
use swarm_core::config::CompletionProvider;
use swarm_core::models::{TaskStatus, WorkflowStatus};
use swarm_core::state::{AppState, AppStateInner};
use swarm_core::{ChatMessage, CompletionClient, CompletionError, Database, SwarmConfig};

struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("FINISH".to_string()))
    }
}

/// Create an in-memory AppState for testing.
fn test_state(replies: Vec<Result<&str, CompletionError>>) -> AppState {
    let db = Database::open(":memory:").expect("Failed to open in-memory database");
    let client = Arc::new(ScriptedClient {
        replies: Mutex::new(
            replies
                .into_iter()
                .map(|r| r.map(|s| s.to_string()))
                .collect(),
        ),
    });
    Arc::new(AppStateInner::new(db, SwarmConfig::default(), client))
}

#[tokio::test]
async fn test_run_follows_workflow_to_completion() {
    let state = test_state(vec![
        Ok("Researcher"),
        Ok("clap is the usual choice"),
        Ok("Coder"),
        Ok("fn main() {}"),
        Ok("FINISH"),
    ]);

    let outcome = commands::run::run(&state, "Build a CLI tool", None, "cli@swarm.local")
        .await
        .expect("run should succeed");
    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.steps, 2);

    let stored = state
        .workflow_store
        .get_with_tasks(&outcome.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.workflow.title, "Build a CLI tool");
    let agents: Vec<&str> = stored
        .tasks
        .iter()
        .map(|t| t.assigned_agent.as_str())
        .collect();
    assert_eq!(agents, vec!["User", "Researcher", "Coder"]);
    assert!(stored.tasks.iter().all(|t| t.status == TaskStatus::Completed));

    assert!(state
        .user_store
        .get_by_email("cli@swarm.local")
        .await
        .unwrap()
        .is_some());
    // The run's observer is gone once the command returns.
    assert_eq!(state.broadcaster.observer_count().await, 0);
}

#[tokio::test]
async fn test_run_reports_failed_workflow_as_error() {
    let state = test_state(vec![Ok("Researcher"), Err(CompletionError::Timeout(5))]);

    let err = commands::run::run(&state, "Find prior art", Some("Survey"), "cli@swarm.local")
        .await
        .unwrap_err();
    assert!(err.contains("failed"));
    assert!(err.contains("timed out"));

    let workflows = state.workflow_store.list(None).await.unwrap();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].title, "Survey");
    assert_eq!(workflows[0].status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn test_user_and_workflow_queries() {
    let state = test_state(vec![]);

    commands::user::create(&state, "ada@example.com").await.unwrap();
    commands::user::create(&state, "ada@example.com").await.unwrap();

    let err = commands::workflow::get(&state, "missing").await.unwrap_err();
    assert!(err.contains("not found"));
    commands::workflow::list(&state, None).await.unwrap();
}

#[test]
fn test_config_file_and_flags_are_layered() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "database_path: /tmp/from-file.db\ncompletion:\n  provider: openai\n  model: file-model\norchestrator:\n  max_steps: 5"
    )
    .unwrap();

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_string_lossy().to_string()),
        model: Some("flag-model".into()),
        ..Default::default()
    };
    let config = overrides.resolve().unwrap();

    assert_eq!(config.completion.provider, CompletionProvider::OpenAi);
    assert_eq!(config.completion.model, "flag-model");
    assert_eq!(config.orchestrator.max_steps, 5);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let overrides = ConfigOverrides {
        config_path: Some("/definitely/not/here.yaml".into()),
        ..Default::default()
    };
    assert!(overrides.resolve().is_err());
}
