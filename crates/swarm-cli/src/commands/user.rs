//! `swarm user`: User management commands.

use swarm_core::state::AppState;

use super::print_json;

pub async fn create(state: &AppState, email: &str) -> Result<(), String> {
    let (user, created) = state
        .user_store
        .find_or_create(email)
        .await
        .map_err(|e| e.to_string())?;
    print_json(&serde_json::json!({
        "id": user.id,
        "email": user.email,
        "status": if created { "created" } else { "exists" },
    }));
    Ok(())
}
