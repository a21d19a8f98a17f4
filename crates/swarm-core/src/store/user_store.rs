use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::SwarmError;
use crate::models::User;

#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, user: &User) -> Result<(), SwarmError> {
        let user = user.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, full_name, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                       email = excluded.email,
                       full_name = excluded.full_name",
                    rusqlite::params![
                        user.id,
                        user.email,
                        user.full_name,
                        user.created_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, SwarmError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT id, email, full_name, created_at FROM users WHERE id = ?1",
                    rusqlite::params![id],
                    |row| Ok(row_to_user(row)),
                )
                .optional()
            })
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, SwarmError> {
        let email = email.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT id, email, full_name, created_at FROM users WHERE email = ?1",
                    rusqlite::params![email],
                    |row| Ok(row_to_user(row)),
                )
                .optional()
            })
            .await
    }

    /// Return the user registered under `email`, creating it if needed.
    /// The boolean is `true` when a new user was created.
    pub async fn find_or_create(&self, email: &str) -> Result<(User, bool), SwarmError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SwarmError::BadRequest("email must not be empty".to_string()));
        }
        if let Some(existing) = self.get_by_email(email).await? {
            return Ok((existing, false));
        }
        let user = User::new(uuid::Uuid::new_v4().to_string(), email.to_string(), None);
        self.save(&user).await?;
        Ok((user, true))
    }
}

use rusqlite::Row;

fn row_to_user(row: &Row<'_>) -> User {
    let created_ms: i64 = row.get(3).unwrap_or(0);
    User {
        id: row.get(0).unwrap_or_default(),
        email: row.get(1).unwrap_or_default(),
        full_name: row.get(2).unwrap_or_default(),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = UserStore::new(Database::open_in_memory().unwrap());
        let (first, created) = store.find_or_create("ada@example.com").await.unwrap();
        assert!(created);
        let (second, created) = store.find_or_create("ada@example.com").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_empty_email_rejected() {
        let store = UserStore::new(Database::open_in_memory().unwrap());
        let err = store.find_or_create("  ").await.unwrap_err();
        assert!(matches!(err, SwarmError::BadRequest(_)));
    }
}
