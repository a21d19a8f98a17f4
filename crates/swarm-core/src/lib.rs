//! SwarmOS Core: Transport-agnostic domain logic for the SwarmOS agent swarm.
//!
//! A user submits a prompt; a supervisor repeatedly picks the next worker
//! agent (Researcher or Coder) from the accumulated work log, the agent
//! contributes, and every step is persisted and broadcast until the
//! supervisor says FINISH. This crate holds that loop together with the
//! data models, SQLite stores, completion backends and progress broadcaster.
//! It has **no HTTP framework dependency** by default, making it suitable
//! for use in:
//!
//! - HTTP servers (via `swarm-server`)
//! - CLI tools (via `swarm-cli`)
//!
//! # Feature Flags
//!
//! - `axum`: Enables `IntoResponse` impl on `SwarmError` for use in axum handlers.

pub mod agents;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestration;
pub mod state;
pub mod store;
pub mod work_log;

// Convenience re-exports
pub use agents::{Agent, RoutingDecision, Speaker};
pub use completion::{build_client, ChatMessage, CompletionClient};
pub use config::SwarmConfig;
pub use db::Database;
pub use error::{CompletionError, SwarmError};
pub use events::{ChannelObserver, Observer, ProgressBroadcaster, ProgressEvent};
pub use orchestration::{Orchestrator, RunOutcome, Submission};
pub use state::{AppState, AppStateInner};
pub use work_log::{WorkItem, WorkLog};
