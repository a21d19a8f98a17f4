use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::SwarmError;
use crate::models::{Task, Workflow, WorkflowStatus, WorkflowWithTasks};

use super::task_store::{query_tasks, upsert_task};

#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, workflow: &Workflow) -> Result<(), SwarmError> {
        let wf = workflow.clone();
        self.db
            .with_conn_async(move |conn| upsert_workflow(conn, &wf))
            .await
    }

    /// Insert a workflow together with its first task. Both rows are written
    /// or neither is.
    pub async fn create_with_seed(&self, workflow: &Workflow, seed: &Task) -> Result<(), SwarmError> {
        let wf = workflow.clone();
        let seed = seed.clone();
        self.db
            .with_conn_async(move |conn| {
                let tx = conn.unchecked_transaction()?;
                upsert_workflow(&tx, &wf)?;
                upsert_task(&tx, &seed)?;
                tx.commit()
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Workflow>, SwarmError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT id, user_id, title, status, created_at, updated_at
                     FROM workflows WHERE id = ?1",
                    rusqlite::params![id],
                    |row| Ok(row_to_workflow(row)),
                )
                .optional()
            })
            .await
    }

    /// Fetch a workflow and its ordered task history in one locked read.
    pub async fn get_with_tasks(&self, id: &str) -> Result<Option<WorkflowWithTasks>, SwarmError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let workflow = conn
                    .query_row(
                        "SELECT id, user_id, title, status, created_at, updated_at
                         FROM workflows WHERE id = ?1",
                        rusqlite::params![id],
                        |row| Ok(row_to_workflow(row)),
                    )
                    .optional()?;
                match workflow {
                    Some(workflow) => {
                        let tasks = query_tasks(conn, &workflow.id)?;
                        Ok(Some(WorkflowWithTasks { workflow, tasks }))
                    }
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn list(&self, user_id: Option<&str>) -> Result<Vec<Workflow>, SwarmError> {
        let user_id = user_id.map(|s| s.to_string());
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, title, status, created_at, updated_at
                     FROM workflows
                     WHERE ?1 IS NULL OR user_id = ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], |row| Ok(row_to_workflow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn list_by_status(&self, status: WorkflowStatus) -> Result<Vec<Workflow>, SwarmError> {
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, title, status, created_at, updated_at
                     FROM workflows WHERE status = ?1
                     ORDER BY created_at ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![status.as_str()], |row| {
                        Ok(row_to_workflow(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn update_status(&self, id: &str, status: WorkflowStatus) -> Result<(), SwarmError> {
        let workflow_id = id.to_string();
        let now = Utc::now().timestamp_millis();
        let updated = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![status.as_str(), now, workflow_id],
                )
            })
            .await?;
        if updated == 0 {
            return Err(SwarmError::NotFound(format!("Workflow {} not found", id)));
        }
        Ok(())
    }
}

fn upsert_workflow(conn: &rusqlite::Connection, wf: &Workflow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO workflows (id, user_id, title, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           status = excluded.status,
           updated_at = excluded.updated_at",
        rusqlite::params![
            wf.id,
            wf.user_id,
            wf.title,
            wf.status.as_str(),
            wf.created_at.timestamp_millis(),
            wf.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

use rusqlite::Row;

fn row_to_workflow(row: &Row<'_>) -> Workflow {
    let created_ms: i64 = row.get(4).unwrap_or(0);
    let updated_ms: i64 = row.get(5).unwrap_or(0);

    Workflow {
        id: row.get(0).unwrap_or_default(),
        user_id: row.get(1).unwrap_or_default(),
        title: row.get(2).unwrap_or_default(),
        status: WorkflowStatus::from_str(&row.get::<_, String>(3).unwrap_or_default())
            .unwrap_or(WorkflowStatus::Pending),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms)
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskStatus, User};
    use crate::store::{TaskStore, UserStore};

    async fn seeded() -> (WorkflowStore, TaskStore, Workflow) {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("u-1".into(), "ops@example.com".into(), None);
        UserStore::new(db.clone()).save(&user).await.unwrap();
        let wf = Workflow::new("wf-1".into(), user.id, "Mission".into());
        let store = WorkflowStore::new(db.clone());
        store.save(&wf).await.unwrap();
        (store, TaskStore::new(db), wf)
    }

    #[tokio::test]
    async fn test_tasks_come_back_in_sequence_order() {
        let (store, tasks, wf) = seeded().await;
        for (seq, agent) in [(2, "Coder"), (0, "User"), (1, "Researcher")] {
            let task = Task::new(
                format!("t-{}", seq),
                wf.id.clone(),
                seq,
                format!("{} step", agent),
                agent.to_string(),
                TaskStatus::Completed,
                None,
            );
            tasks.save(&task).await.unwrap();
        }

        let full = store.get_with_tasks(&wf.id).await.unwrap().unwrap();
        let agents: Vec<&str> = full.tasks.iter().map(|t| t.assigned_agent.as_str()).collect();
        assert_eq!(agents, vec!["User", "Researcher", "Coder"]);
    }

    #[tokio::test]
    async fn test_create_with_seed_is_all_or_nothing() {
        let (store, tasks, wf) = seeded().await;
        let second = Workflow::new("wf-2".into(), wf.user_id.clone(), "Second".into());
        // The seed points at a workflow that does not exist, so its insert
        // trips the foreign key.
        let orphan_seed = Task::new(
            "t-orphan".into(),
            "wf-missing".into(),
            0,
            "Initial Request".into(),
            "User".into(),
            TaskStatus::Queued,
            None,
        );
        let err = store.create_with_seed(&second, &orphan_seed).await.unwrap_err();
        assert!(matches!(err, SwarmError::Persistence(_)));
        assert!(store.get("wf-2").await.unwrap().is_none());
        assert!(tasks.get("t-orphan").await.unwrap().is_none());

        let seed = Task::new(
            "t-seed".into(),
            second.id.clone(),
            0,
            "Initial Request".into(),
            "User".into(),
            TaskStatus::Queued,
            None,
        );
        store.create_with_seed(&second, &seed).await.unwrap();
        let full = store.get_with_tasks("wf-2").await.unwrap().unwrap();
        assert_eq!(full.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_of_unknown_workflow_is_not_found() {
        let (store, _, _) = seeded().await;
        let err = store
            .update_status("missing", WorkflowStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_task_status_update_keeps_existing_output() {
        let (_, tasks, wf) = seeded().await;
        let mut task = Task::new(
            "t-0".into(),
            wf.id.clone(),
            0,
            "Initial Request".into(),
            "User".into(),
            TaskStatus::Queued,
            Some(serde_json::json!({ "prompt": "hi" })),
        );
        task.output_payload = Some(Task::result_payload("hi"));
        tasks.save(&task).await.unwrap();

        tasks
            .update_status("t-0", TaskStatus::Completed, None)
            .await
            .unwrap();
        let stored = tasks.get("t-0").await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result(), Some("hi"));
        assert_eq!(stored.input_payload.unwrap()["prompt"], "hi");
    }
}
