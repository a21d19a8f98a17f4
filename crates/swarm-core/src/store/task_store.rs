use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::SwarmError;
use crate::models::{Task, TaskStatus};

const TASK_COLUMNS: &str = "id, workflow_id, sequence, title, assigned_agent, status,
     input_payload, output_payload, created_at, updated_at";

#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, task: &Task) -> Result<(), SwarmError> {
        let task = task.clone();
        self.db
            .with_conn_async(move |conn| upsert_task(conn, &task))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, SwarmError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                    rusqlite::params![id],
                    |row| Ok(row_to_task(row)),
                )
                .optional()
            })
            .await
    }

    /// All tasks of a workflow in execution order.
    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<Task>, SwarmError> {
        let workflow_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| query_tasks(conn, &workflow_id))
            .await
    }

    /// Update a task's status and, optionally, its output. Errors with
    /// `NotFound` when no such task exists.
    pub async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        output_payload: Option<serde_json::Value>,
    ) -> Result<(), SwarmError> {
        let task_id = id.to_string();
        let now = Utc::now().timestamp_millis();
        let updated = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE tasks
                     SET status = ?1,
                         output_payload = COALESCE(?2, output_payload),
                         updated_at = ?3
                     WHERE id = ?4",
                    rusqlite::params![
                        status.as_str(),
                        output_payload.map(|v| v.to_string()),
                        now,
                        task_id,
                    ],
                )
            })
            .await?;
        if updated == 0 {
            return Err(SwarmError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }
}

pub(crate) fn upsert_task(conn: &rusqlite::Connection, task: &Task) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO tasks (id, workflow_id, sequence, title, assigned_agent, status,
                            input_payload, output_payload, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
           status = excluded.status,
           output_payload = excluded.output_payload,
           updated_at = excluded.updated_at",
        rusqlite::params![
            task.id,
            task.workflow_id,
            task.sequence,
            task.title,
            task.assigned_agent,
            task.status.as_str(),
            task.input_payload.as_ref().map(|v| v.to_string()),
            task.output_payload.as_ref().map(|v| v.to_string()),
            task.created_at.timestamp_millis(),
            task.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

pub(crate) fn query_tasks(
    conn: &rusqlite::Connection,
    workflow_id: &str,
) -> Result<Vec<Task>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks WHERE workflow_id = ?1 ORDER BY sequence ASC",
        TASK_COLUMNS
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![workflow_id], |row| Ok(row_to_task(row)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

use rusqlite::Row;

fn row_to_task(row: &Row<'_>) -> Task {
    let parse_json = |idx: usize| -> Option<serde_json::Value> {
        row.get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .and_then(|s| serde_json::from_str(&s).ok())
    };
    let created_ms: i64 = row.get(8).unwrap_or(0);
    let updated_ms: i64 = row.get(9).unwrap_or(0);

    Task {
        id: row.get(0).unwrap_or_default(),
        workflow_id: row.get(1).unwrap_or_default(),
        sequence: row.get(2).unwrap_or(0),
        title: row.get(3).unwrap_or_default(),
        assigned_agent: row.get(4).unwrap_or_default(),
        status: TaskStatus::from_str(&row.get::<_, String>(5).unwrap_or_default())
            .unwrap_or(TaskStatus::Queued),
        input_payload: parse_json(6),
        output_payload: parse_json(7),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms)
            .unwrap_or_else(Utc::now),
    }
}
