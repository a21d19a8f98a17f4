//! Cooperative cancellation flags, one per live orchestration loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct CancellationRegistry {
    flags: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, workflow_id: &str) {
        self.flags
            .write()
            .await
            .insert(workflow_id.to_string(), Arc::new(AtomicBool::new(false)));
    }

    /// Flag a live loop for cancellation. Returns `false` if no loop is
    /// registered for `workflow_id` or it was already flagged.
    pub async fn cancel(&self, workflow_id: &str) -> bool {
        match self.flags.read().await.get(workflow_id) {
            Some(flag) => !flag.swap(true, Ordering::SeqCst),
            None => false,
        }
    }

    pub async fn is_cancelled(&self, workflow_id: &str) -> bool {
        self.flags
            .read()
            .await
            .get(workflow_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.flags.read().await.contains_key(workflow_id)
    }

    pub async fn remove(&self, workflow_id: &str) {
        self.flags.write().await.remove(workflow_id);
    }
}
