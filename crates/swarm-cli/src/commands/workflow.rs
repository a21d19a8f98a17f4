//! `swarm workflow`: Inspect stored workflows.
//!
//! Cancellation needs the process that owns the loop, so it is only offered
//! by the server's `POST /api/v1/workflows/{id}/cancel`.

use swarm_core::state::AppState;

use super::print_json;

pub async fn get(state: &AppState, workflow_id: &str) -> Result<(), String> {
    let workflow = state
        .workflow_store
        .get_with_tasks(workflow_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Workflow {} not found", workflow_id))?;
    print_json(&serde_json::to_value(&workflow).map_err(|e| e.to_string())?);
    Ok(())
}

pub async fn list(state: &AppState, user_id: Option<&str>) -> Result<(), String> {
    let workflows = state
        .workflow_store
        .list(user_id)
        .await
        .map_err(|e| e.to_string())?;
    print_json(&serde_json::json!({ "workflows": workflows }));
    Ok(())
}
