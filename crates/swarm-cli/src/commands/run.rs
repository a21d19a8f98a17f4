//! `swarm run -p "prompt"`: Submit a workflow and follow it to the end.
//!
//! Progress events are printed as the loop emits them; the command returns
//! once the workflow reaches a terminal status.

use std::sync::Arc;

use console::style;

use swarm_core::events::ChannelObserver;
use swarm_core::models::{CreateWorkflowInput, TaskStatus, WorkflowStatus};
use swarm_core::state::AppState;
use swarm_core::{ProgressEvent, RunOutcome, Speaker};

/// Events buffered between the loop and the console printer.
const PROGRESS_BUFFER: usize = 256;

pub async fn run(
    state: &AppState,
    prompt: &str,
    title: Option<&str>,
    email: &str,
) -> Result<RunOutcome, String> {
    let (user, _) = state
        .user_store
        .find_or_create(email)
        .await
        .map_err(|e| e.to_string())?;

    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| default_title(prompt));

    // Register before submitting so the first events are not missed.
    let (observer, mut rx) = ChannelObserver::channel(PROGRESS_BUFFER, None);
    let observer_id = state.broadcaster.register(Arc::new(observer)).await;

    let submission = state
        .orchestrator
        .submit(
            &user.id,
            CreateWorkflowInput {
                title,
                initial_prompt: prompt.to_string(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    let workflow_id = submission.workflow.workflow.id.clone();

    println!(
        "🐝 Workflow {}: \"{}\"",
        style(&workflow_id).bold(),
        submission.workflow.workflow.title
    );
    println!();

    let mut handle = submission.handle;
    let joined = loop {
        tokio::select! {
            Some(event) = rx.recv() => print_event(&event, &workflow_id),
            joined = &mut handle => break joined,
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(&event, &workflow_id);
    }
    state.broadcaster.unregister(observer_id).await;

    let outcome = joined.map_err(|e| format!("Workflow loop panicked: {}", e))?;
    print_summary(&outcome);

    match outcome.status {
        WorkflowStatus::Completed => Ok(outcome),
        _ => Err(format!(
            "Workflow {} failed: {}",
            outcome.workflow_id,
            outcome.failure.as_deref().unwrap_or("unknown error")
        )),
    }
}

fn default_title(prompt: &str) -> String {
    let first_line = prompt.lines().next().unwrap_or("").trim();
    let mut title: String = first_line.chars().take(60).collect();
    if first_line.chars().count() > 60 {
        title.push('…');
    }
    if title.is_empty() {
        "Untitled workflow".to_string()
    } else {
        title
    }
}

fn print_event(event: &ProgressEvent, workflow_id: &str) {
    if event.workflow_id() != workflow_id {
        return;
    }
    match event {
        ProgressEvent::TaskUpdate {
            agent,
            status,
            result,
            ..
        } => {
            let marker = match status {
                TaskStatus::Queued => style("…").dim(),
                TaskStatus::Running => style("▶").cyan(),
                TaskStatus::Completed => style("✓").green(),
                TaskStatus::Failed => style("✗").red(),
            };
            println!("{} {:<10} {}", marker, style(agent).bold(), status.as_str());
            if *status == TaskStatus::Failed {
                if let Some(text) = result {
                    println!("  {}", style(text).red());
                }
            }
        }
        ProgressEvent::WorkflowUpdate { status, .. } => {
            println!("{} workflow {}", style("◆").magenta(), status.as_str());
        }
    }
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    if let Some(err) = &outcome.routing_error {
        println!(
            "{} supervisor unavailable, finished early: {}",
            style("⚠").yellow(),
            err
        );
    }

    let last_agent_item = outcome
        .work_log
        .items()
        .iter()
        .rev()
        .find(|item| item.speaker != Speaker::User);
    if let Some(item) = last_agent_item {
        println!("── {} ──", style(item.speaker.name()).bold());
        println!("{}", item.content);
        println!();
    }

    println!(
        "{} step(s), workflow {}",
        outcome.steps,
        match outcome.status {
            WorkflowStatus::Completed => style(outcome.status.as_str()).green(),
            _ => style(outcome.status.as_str()).red(),
        }
    );
}
