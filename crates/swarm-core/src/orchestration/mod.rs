//! Orchestrator: the supervisor-directed routing loop.
//!
//! One loop runs per submitted workflow, on its own tokio task:
//!
//! ```text
//!   submit ──► Workflow(pending) + Task(User, queued) ──► spawn
//!                                                          │
//!   Idle:    seed task completed, workflow running         ▼
//!   Running: ┌─► cancelled? / step limit? ──────────────► Failed
//!            │   SupervisorRouter::decide(log)
//!            │     ├─ FINISH ─────────────────────────────► Completed
//!            │     └─ agent  ─► Task(agent, running)
//!            │                  StepExecutor::execute(agent, log)
//!            │                    ├─ ok  ─► append, Task completed
//!            └────────────────────┘ err ─► Task failed ──► Failed
//! ```
//!
//! Every transition is persisted before its progress event is broadcast, and
//! the workflow's terminal status is written exactly when the loop exits.

pub mod cancel;
pub mod executor;
pub mod router;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::agents::{Agent, RoutingDecision, SUPERVISOR_IDENTITY, USER_IDENTITY};
use crate::completion::CompletionClient;
use crate::config::OrchestratorConfig;
use crate::error::SwarmError;
use crate::events::{ProgressBroadcaster, ProgressEvent};
use crate::models::{
    CreateWorkflowInput, Task, TaskStatus, Workflow, WorkflowStatus, WorkflowWithTasks,
};
use crate::store::{TaskStore, UserStore, WorkflowStore};
use crate::work_log::WorkLog;

pub use cancel::CancellationRegistry;
pub use executor::StepExecutor;
pub use router::{parse_routing_answer, RouterVerdict, SupervisorRouter};

/// Title of the seed task holding the user's prompt.
pub const SEED_TASK_TITLE: &str = "Initial Request";

/// What a finished run looked like. Returned through the spawn handle.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub workflow_id: String,
    /// Final status of the workflow (`completed` or `failed`).
    pub status: WorkflowStatus,
    /// Number of agent steps that completed successfully.
    pub steps: usize,
    pub work_log: WorkLog,
    /// Why the run failed, when it did.
    pub failure: Option<String>,
    /// Set when the router's completion call failed and it fell back to FINISH.
    pub routing_error: Option<String>,
}

/// Result of a submission: the persisted workflow and the handle of the loop
/// running it. Dropping the handle detaches the loop.
pub struct Submission {
    pub workflow: WorkflowWithTasks,
    pub handle: JoinHandle<RunOutcome>,
}

enum LoopExit {
    Finished,
    Failed(String),
}

struct RunState {
    log: WorkLog,
    steps: usize,
    routing_error: Option<String>,
    /// Agent task persisted as `running` whose terminal status is not yet
    /// durable.
    in_flight: Option<(String, Agent)>,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    router: SupervisorRouter,
    executor: StepExecutor,
    user_store: UserStore,
    workflow_store: WorkflowStore,
    task_store: TaskStore,
    broadcaster: ProgressBroadcaster,
    cancellations: CancellationRegistry,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        client: Arc<dyn CompletionClient>,
        user_store: UserStore,
        workflow_store: WorkflowStore,
        task_store: TaskStore,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        Self {
            config,
            router: SupervisorRouter::new(client.clone()),
            executor: StepExecutor::new(client),
            user_store,
            workflow_store,
            task_store,
            broadcaster,
            cancellations: CancellationRegistry::new(),
        }
    }

    /// Persist a new workflow with its seed task and start its loop.
    ///
    /// Returns as soon as the records are durable; the loop runs on its own
    /// task. The returned workflow carries an empty task list.
    pub async fn submit(
        self: &Arc<Self>,
        user_id: &str,
        input: CreateWorkflowInput,
    ) -> Result<Submission, SwarmError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(SwarmError::BadRequest("title must not be empty".to_string()));
        }
        if input.initial_prompt.trim().is_empty() {
            return Err(SwarmError::BadRequest(
                "initial_prompt must not be empty".to_string(),
            ));
        }
        if self.user_store.get(user_id).await?.is_none() {
            return Err(SwarmError::NotFound(format!("User {} not found", user_id)));
        }

        let workflow = Workflow::new(
            uuid::Uuid::new_v4().to_string(),
            user_id.to_string(),
            title.to_string(),
        );
        let seed = Task::new(
            uuid::Uuid::new_v4().to_string(),
            workflow.id.clone(),
            0,
            SEED_TASK_TITLE.to_string(),
            USER_IDENTITY.to_string(),
            TaskStatus::Queued,
            Some(serde_json::json!({ "prompt": input.initial_prompt })),
        );
        self.workflow_store.create_with_seed(&workflow, &seed).await?;

        self.cancellations.register(&workflow.id).await;

        tracing::info!(
            "[Orchestrator] Workflow {} (\"{}\") submitted by user {}",
            workflow.id,
            workflow.title,
            user_id
        );

        let orchestrator = Arc::clone(self);
        let workflow_id = workflow.id.clone();
        let prompt = input.initial_prompt;
        let handle = tokio::spawn(async move {
            let outcome = orchestrator.drive(&workflow_id, seed, prompt).await;
            orchestrator.cancellations.remove(&workflow_id).await;
            outcome
        });

        Ok(Submission {
            workflow: WorkflowWithTasks {
                workflow,
                tasks: Vec::new(),
            },
            handle,
        })
    }

    /// Request cooperative cancellation. Takes effect before the next routing
    /// call. Returns `false` when the workflow exists but is not running.
    pub async fn cancel(&self, workflow_id: &str) -> Result<bool, SwarmError> {
        let workflow = self
            .workflow_store
            .get(workflow_id)
            .await?
            .ok_or_else(|| SwarmError::NotFound(format!("Workflow {} not found", workflow_id)))?;
        if workflow.status.is_terminal() {
            return Ok(false);
        }
        let cancelled = self.cancellations.cancel(workflow_id).await;
        if cancelled {
            tracing::info!("[Orchestrator] Cancellation requested for {}", workflow_id);
        }
        Ok(cancelled)
    }

    /// Mark workflows left non-terminal by a previous process as failed.
    ///
    /// Their loops no longer exist, so leaving them `pending`/`running` would
    /// break the "terminal iff the loop exited" rule. Returns how many were
    /// recovered.
    pub async fn recover_interrupted(&self) -> Result<usize, SwarmError> {
        let mut recovered = 0;
        for status in [WorkflowStatus::Pending, WorkflowStatus::Running] {
            for workflow in self.workflow_store.list_by_status(status).await? {
                if self.cancellations.is_running(&workflow.id).await {
                    continue;
                }
                self.workflow_store
                    .update_status(&workflow.id, WorkflowStatus::Failed)
                    .await?;
                tracing::warn!(
                    "[Orchestrator] Workflow {} was {} with no live loop; marked failed",
                    workflow.id,
                    status.as_str()
                );
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn drive(&self, workflow_id: &str, seed: Task, prompt: String) -> RunOutcome {
        let mut run = RunState {
            log: WorkLog::seeded(prompt),
            steps: 0,
            routing_error: None,
            in_flight: None,
        };

        let (status, failure) = match self.step_loop(workflow_id, &seed, &mut run).await {
            Ok(LoopExit::Finished) => (WorkflowStatus::Completed, None),
            Ok(LoopExit::Failed(reason)) => (WorkflowStatus::Failed, Some(reason)),
            Err(e) => {
                tracing::error!(
                    "[Orchestrator] Aborting workflow {} after fatal error: {}",
                    workflow_id,
                    e
                );
                let reason = e.to_string();
                if let Some((task_id, agent)) = run.in_flight.take() {
                    self.fail_in_flight(workflow_id, &task_id, agent, &reason)
                        .await;
                }
                (WorkflowStatus::Failed, Some(reason))
            }
        };

        let failure = match self.workflow_store.update_status(workflow_id, status).await {
            Ok(()) => {
                self.broadcaster
                    .broadcast(&ProgressEvent::WorkflowUpdate {
                        workflow_id: workflow_id.to_string(),
                        status,
                    })
                    .await;
                failure
            }
            Err(e) => {
                tracing::error!(
                    "[Orchestrator] Could not persist final status of {}: {}",
                    workflow_id,
                    e
                );
                Some(failure.unwrap_or_else(|| e.to_string()))
            }
        };

        tracing::info!(
            "[Orchestrator] Workflow {} finished as {} after {} step(s)",
            workflow_id,
            status.as_str(),
            run.steps
        );

        RunOutcome {
            workflow_id: workflow_id.to_string(),
            status,
            steps: run.steps,
            work_log: run.log,
            failure,
            routing_error: run.routing_error,
        }
    }

    async fn step_loop(
        &self,
        workflow_id: &str,
        seed: &Task,
        run: &mut RunState,
    ) -> Result<LoopExit, SwarmError> {
        // Idle → Running
        let prompt = run
            .log
            .last()
            .map(|item| item.content.clone())
            .unwrap_or_default();
        self.task_store
            .update_status(&seed.id, TaskStatus::Completed, Some(Task::result_payload(&prompt)))
            .await?;
        self.emit_task(&seed.id, workflow_id, USER_IDENTITY, TaskStatus::Completed, None)
            .await;
        self.workflow_store
            .update_status(workflow_id, WorkflowStatus::Running)
            .await?;
        self.broadcaster
            .broadcast(&ProgressEvent::WorkflowUpdate {
                workflow_id: workflow_id.to_string(),
                status: WorkflowStatus::Running,
            })
            .await;

        loop {
            if self.cancellations.is_cancelled(workflow_id).await {
                let reason = "Workflow cancelled by request".to_string();
                self.record_supervisor_failure(workflow_id, run, &reason).await?;
                return Ok(LoopExit::Failed(reason));
            }
            if run.steps >= self.config.max_steps {
                let reason = format!(
                    "Step limit of {} reached before the supervisor finished",
                    self.config.max_steps
                );
                self.record_supervisor_failure(workflow_id, run, &reason).await?;
                return Ok(LoopExit::Failed(reason));
            }

            let verdict = self.router.decide(&run.log).await;
            if let Some(err) = &verdict.error {
                run.routing_error = Some(err.to_string());
            }
            let agent = match verdict.decision {
                RoutingDecision::Finish => {
                    tracing::info!("[Orchestrator] Supervisor finished workflow {}", workflow_id);
                    return Ok(LoopExit::Finished);
                }
                RoutingDecision::Agent(agent) => agent,
            };

            tracing::info!(
                "[Orchestrator] Workflow {} step {}: routing to {}",
                workflow_id,
                run.steps + 1,
                agent
            );
            let task = self
                .start_agent_task(workflow_id, agent, run, verdict.raw_answer.as_deref())
                .await?;
            run.in_flight = Some((task.id.clone(), agent));

            match self.executor.execute(agent, &run.log).await {
                Ok(item) => {
                    let content = item.content.clone();
                    run.log.append(item)?;
                    run.steps += 1;
                    self.task_store
                        .update_status(
                            &task.id,
                            TaskStatus::Completed,
                            Some(Task::result_payload(&content)),
                        )
                        .await?;
                    run.in_flight = None;
                    self.emit_task(
                        &task.id,
                        workflow_id,
                        agent.as_str(),
                        TaskStatus::Completed,
                        Some(content),
                    )
                    .await;
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!(
                        "[Orchestrator] Step {} of workflow {} failed: {}",
                        run.steps + 1,
                        workflow_id,
                        reason
                    );
                    self.task_store
                        .update_status(
                            &task.id,
                            TaskStatus::Failed,
                            Some(Task::result_payload(&reason)),
                        )
                        .await?;
                    run.in_flight = None;
                    self.emit_task(
                        &task.id,
                        workflow_id,
                        agent.as_str(),
                        TaskStatus::Failed,
                        Some(reason.clone()),
                    )
                    .await;
                    return Ok(LoopExit::Failed(reason));
                }
            }
        }
    }

    async fn start_agent_task(
        &self,
        workflow_id: &str,
        agent: Agent,
        run: &RunState,
        supervisor_answer: Option<&str>,
    ) -> Result<Task, SwarmError> {
        let task = Task::new(
            uuid::Uuid::new_v4().to_string(),
            workflow_id.to_string(),
            run.log.next_sequence() as i64,
            format!("{} step {}", agent, run.steps + 1),
            agent.as_str().to_string(),
            TaskStatus::Running,
            supervisor_answer.map(|answer| serde_json::json!({ "supervisor_answer": answer })),
        );
        self.task_store.save(&task).await?;
        self.emit_task(&task.id, workflow_id, agent.as_str(), TaskStatus::Running, None)
            .await;
        Ok(task)
    }

    /// Best-effort transition of an interrupted agent task to `failed`.
    async fn fail_in_flight(&self, workflow_id: &str, task_id: &str, agent: Agent, reason: &str) {
        match self
            .task_store
            .update_status(task_id, TaskStatus::Failed, Some(Task::result_payload(reason)))
            .await
        {
            Ok(()) => {
                self.emit_task(
                    task_id,
                    workflow_id,
                    agent.as_str(),
                    TaskStatus::Failed,
                    Some(reason.to_string()),
                )
                .await
            }
            Err(e) => tracing::error!(
                "[Orchestrator] Could not mark task {} of {} failed: {}",
                task_id,
                workflow_id,
                e
            ),
        }
    }

    /// Persist a failed task attributed to the supervisor for loop-level
    /// failures (cancellation, step limit).
    async fn record_supervisor_failure(
        &self,
        workflow_id: &str,
        run: &RunState,
        reason: &str,
    ) -> Result<(), SwarmError> {
        tracing::warn!("[Orchestrator] Workflow {}: {}", workflow_id, reason);
        let mut task = Task::new(
            uuid::Uuid::new_v4().to_string(),
            workflow_id.to_string(),
            run.log.next_sequence() as i64,
            "Supervisor stop".to_string(),
            SUPERVISOR_IDENTITY.to_string(),
            TaskStatus::Failed,
            None,
        );
        task.output_payload = Some(Task::result_payload(reason));
        self.task_store.save(&task).await?;
        self.emit_task(
            &task.id,
            workflow_id,
            SUPERVISOR_IDENTITY,
            TaskStatus::Failed,
            Some(reason.to_string()),
        )
        .await;
        Ok(())
    }

    async fn emit_task(
        &self,
        task_id: &str,
        workflow_id: &str,
        agent: &str,
        status: TaskStatus,
        result: Option<String>,
    ) {
        self.broadcaster
            .broadcast(&ProgressEvent::TaskUpdate {
                task_id: task_id.to_string(),
                workflow_id: workflow_id.to_string(),
                agent: agent.to_string(),
                status,
                result,
            })
            .await;
    }
}
