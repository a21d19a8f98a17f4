//! Progress events and the broadcaster that fans them out to observers.
//!
//! Delivery is best-effort: each broadcast works on a snapshot of the
//! registry taken under a read lock, delivers outside the lock, and then
//! prunes every observer whose delivery failed. A failing observer never
//! affects the others and never surfaces an error to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use crate::models::{TaskStatus, WorkflowStatus};

/// Ephemeral message pushed to live observers. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    TaskUpdate {
        task_id: String,
        workflow_id: String,
        agent: String,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    WorkflowUpdate {
        workflow_id: String,
        status: WorkflowStatus,
    },
}

impl ProgressEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::TaskUpdate { workflow_id, .. } | Self::WorkflowUpdate { workflow_id, .. } => {
                workflow_id
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("observer disconnected")]
    Disconnected,
    #[error("observer buffer is full")]
    Lagging,
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// A live connection that wants progress events.
///
/// `deliver` must not block; transports that need to await should hand the
/// event to a queue and drain it elsewhere (see `ChannelObserver`).
pub trait Observer: Send + Sync {
    fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError>;
}

pub type ObserverId = u64;

/// Observer backed by a bounded channel, optionally scoped to one workflow.
pub struct ChannelObserver {
    tx: mpsc::Sender<ProgressEvent>,
    workflow_id: Option<String>,
}

impl ChannelObserver {
    /// Create an observer and the receiving half the transport drains.
    pub fn channel(
        capacity: usize,
        workflow_id: Option<String>,
    ) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, workflow_id }, rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        if let Some(scope) = &self.workflow_id {
            if scope != event.workflow_id() {
                return Ok(());
            }
        }
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
        })
    }
}

struct BroadcasterInner {
    observers: RwLock<HashMap<ObserverId, Arc<dyn Observer>>>,
    next_id: AtomicU64,
}

/// Registry of live observers. Cheap to clone; all clones share the registry.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    inner: Arc<BroadcasterInner>,
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                observers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub async fn register(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.write().await.insert(id, observer);
        tracing::debug!("[Broadcaster] Registered observer {}", id);
        id
    }

    /// Returns `false` if the observer was already gone.
    pub async fn unregister(&self, id: ObserverId) -> bool {
        let removed = self.inner.observers.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!("[Broadcaster] Unregistered observer {}", id);
        }
        removed
    }

    pub async fn observer_count(&self) -> usize {
        self.inner.observers.read().await.len()
    }

    /// Deliver `event` to every registered observer. Returns the number of
    /// successful deliveries; failed observers are dropped from the registry.
    pub async fn broadcast(&self, event: &ProgressEvent) -> usize {
        let mut snapshot: Vec<(ObserverId, Arc<dyn Observer>)> = {
            let observers = self.inner.observers.read().await;
            observers
                .iter()
                .map(|(id, obs)| (*id, Arc::clone(obs)))
                .collect()
        };
        if snapshot.is_empty() {
            return 0;
        }
        snapshot.sort_by_key(|(id, _)| *id);

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, observer) in &snapshot {
            match observer.deliver(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("[Broadcaster] Dropping observer {}: {}", id, e);
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut observers = self.inner.observers.write().await;
            for id in dead {
                observers.remove(&id);
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl Observer for Recorder {
        fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Observer for Broken {
        fn deliver(&self, _event: &ProgressEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Failed("socket reset".into()))
        }
    }

    fn task_event(workflow_id: &str, status: TaskStatus) -> ProgressEvent {
        ProgressEvent::TaskUpdate {
            task_id: "t-1".into(),
            workflow_id: workflow_id.into(),
            agent: "Coder".into(),
            status,
            result: None,
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_observers_is_noop() {
        let hub = ProgressBroadcaster::new();
        assert_eq!(hub.broadcast(&task_event("wf", TaskStatus::Running)).await, 0);
        assert_eq!(hub.observer_count().await, 0);
    }

    #[tokio::test]
    async fn test_failing_observer_is_pruned_and_others_still_receive() {
        let hub = ProgressBroadcaster::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        hub.register(recorder.clone()).await;
        hub.register(Arc::new(Broken)).await;
        assert_eq!(hub.observer_count().await, 2);

        let delivered = hub.broadcast(&task_event("wf", TaskStatus::Running)).await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.observer_count().await, 1);

        hub.broadcast(&task_event("wf", TaskStatus::Completed)).await;
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], task_event("wf", TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_closed_channel_observer_is_pruned() {
        let hub = ProgressBroadcaster::new();
        let (observer, rx) = ChannelObserver::channel(8, None);
        hub.register(Arc::new(observer)).await;
        drop(rx);

        hub.broadcast(&task_event("wf", TaskStatus::Running)).await;
        assert_eq!(hub.observer_count().await, 0);
    }

    #[tokio::test]
    async fn test_scoped_observer_only_sees_its_workflow_in_order() {
        let hub = ProgressBroadcaster::new();
        let (observer, mut rx) = ChannelObserver::channel(8, Some("wf-a".into()));
        hub.register(Arc::new(observer)).await;

        hub.broadcast(&task_event("wf-a", TaskStatus::Running)).await;
        hub.broadcast(&task_event("wf-b", TaskStatus::Running)).await;
        hub.broadcast(&task_event("wf-a", TaskStatus::Completed)).await;

        assert_eq!(rx.recv().await, Some(task_event("wf-a", TaskStatus::Running)));
        assert_eq!(rx.recv().await, Some(task_event("wf-a", TaskStatus::Completed)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister() {
        let hub = ProgressBroadcaster::new();
        let id = hub.register(Arc::new(Broken)).await;
        assert!(hub.unregister(id).await);
        assert!(!hub.unregister(id).await);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::TaskUpdate {
            task_id: "t-9".into(),
            workflow_id: "wf-1".into(),
            agent: "Coder".into(),
            status: TaskStatus::Completed,
            result: Some("done".into()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "task_update",
                "task_id": "t-9",
                "workflow_id": "wf-1",
                "agent": "Coder",
                "status": "completed",
                "result": "done",
            })
        );
    }
}
