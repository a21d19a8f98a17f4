//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the swarm-core domain logic through `AppState`.

pub mod run;
pub mod server;
pub mod user;
pub mod workflow;

use std::sync::Arc;

use swarm_core::completion::build_client;
use swarm_core::config::CompletionProvider;
use swarm_core::state::{AppState, AppStateInner};
use swarm_core::SwarmConfig;

/// Configuration values given on the command line. Applied on top of the
/// file and environment layers.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub config_path: Option<String>,
    pub db: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_steps: Option<usize>,
}

impl ConfigOverrides {
    /// Load the layered configuration and apply these overrides last.
    pub fn resolve(&self) -> Result<SwarmConfig, String> {
        let mut config = SwarmConfig::load(self.config_path.as_deref())?;
        self.apply(&mut config)?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut SwarmConfig) -> Result<(), String> {
        if let Some(db) = &self.db {
            config.database_path = db.clone();
        }
        if let Some(provider) = &self.provider {
            config.completion.provider = CompletionProvider::from_str(provider)
                .ok_or_else(|| format!("Unknown provider: '{}'", provider))?;
        }
        if let Some(model) = &self.model {
            config.completion.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            config.completion.base_url = url.clone();
        }
        if let Some(steps) = self.max_steps {
            config.orchestrator.max_steps = steps;
        }
        config.validate()
    }
}

/// Initialize a shared `AppState` from the resolved configuration.
///
/// This mirrors `swarm_server::create_app_state` but exits the process on
/// failure. Interrupted-workflow recovery is left to the server, which may be
/// sharing the database and owns the loops still running in it.
pub fn init_state(config: SwarmConfig) -> AppState {
    let db = swarm_core::Database::open(&config.database_path).unwrap_or_else(|e| {
        eprintln!(
            "Failed to open database '{}': {}",
            config.database_path, e
        );
        std::process::exit(1);
    });

    let client = build_client(&config.completion);
    Arc::new(AppStateInner::new(db, config, client))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
