//! Shared application state for the HTTP server and the CLI.

use std::sync::Arc;

use crate::completion::CompletionClient;
use crate::config::SwarmConfig;
use crate::db::Database;
use crate::events::ProgressBroadcaster;
use crate::orchestration::Orchestrator;
use crate::store::{TaskStore, UserStore, WorkflowStore};

/// Shared state accessible by all API handlers and commands.
pub struct AppStateInner {
    pub db: Database,
    pub config: SwarmConfig,
    pub user_store: UserStore,
    pub workflow_store: WorkflowStore,
    pub task_store: TaskStore,
    pub broadcaster: ProgressBroadcaster,
    pub orchestrator: Arc<Orchestrator>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database, config: SwarmConfig, client: Arc<dyn CompletionClient>) -> Self {
        let user_store = UserStore::new(db.clone());
        let workflow_store = WorkflowStore::new(db.clone());
        let task_store = TaskStore::new(db.clone());
        let broadcaster = ProgressBroadcaster::new();
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator.clone(),
            client,
            user_store.clone(),
            workflow_store.clone(),
            task_store.clone(),
            broadcaster.clone(),
        ));
        Self {
            db,
            config,
            user_store,
            workflow_store,
            task_store,
            broadcaster,
            orchestrator,
        }
    }
}
