// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PostgreSQL-backed store.
//!
//! The schema is ensured at connect time with `CREATE TABLE IF NOT EXISTS`;
//! there is no separate migration step. Queries are bound at runtime so the
//! crate builds without a live database.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use glacier_core::{SessionId, SessionRecord, TaskId, TaskRecord, TaskState, User};

use crate::{Store, StoreError};

/// How long to wait for the database endpoint to accept TCP.
const CONNECT_WAIT: Duration = Duration::from_secs(180);

/// Poll interval while waiting for the endpoint.
const CONNECT_POLL: Duration = Duration::from_millis(500);

/// Connection settings for [`PgStore::connect`].
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub pass: String,
}

impl PgConfig {
    fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.pass, self.host, self.port, self.name
        )
    }
}

/// [`Store`] implementation over a PostgreSQL pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database, waiting for the endpoint to come up first.
    ///
    /// The database container may start after the server; polls the raw
    /// TCP endpoint every 500 ms for up to 180 s before giving up, which
    /// fails process startup.
    pub async fn connect(config: &PgConfig) -> Result<Self, StoreError> {
        wait_for_endpoint(&config.host, config.port).await?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.url())
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::info!(host = %config.host, port = config.port, name = %config.name, "database ready");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_table (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS session_table (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                creation_time TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS task_table (
                id TEXT PRIMARY KEY,
                task_name TEXT NOT NULL,
                parent_session_id TEXT NOT NULL,
                username TEXT NOT NULL,
                blend_file_path TEXT NOT NULL,
                state TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Poll the raw TCP endpoint until it accepts a connection.
async fn wait_for_endpoint(host: &str, port: u16) -> Result<(), StoreError> {
    let deadline = tokio::time::Instant::now() + CONNECT_WAIT;
    loop {
        match tokio::net::TcpStream::connect((host, port)).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(StoreError::ConnectTimeout(CONNECT_WAIT));
                }
                tracing::debug!(host, port, error = %e, "database endpoint not ready");
                tokio::time::sleep(CONNECT_POLL).await;
            }
        }
    }
}

/// Map a unique-violation insert error to [`StoreError::Duplicate`].
fn map_insert_err(err: sqlx::Error, table: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                table,
                key: key.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

fn task_from_row(row: &sqlx::postgres::PgRow) -> Result<TaskRecord, StoreError> {
    let state_raw: String = row.try_get("state")?;
    Ok(TaskRecord {
        task_id: TaskId::new(row.try_get::<String, _>("id")?),
        task_name: row.try_get("task_name")?,
        parent_session_id: SessionId::new(row.try_get::<String, _>("parent_session_id")?),
        username: row.try_get("username")?,
        blend_file_path: row.try_get("blend_file_path")?,
        state: TaskState::from_str(&state_raw)?,
    })
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<SessionRecord, StoreError> {
    Ok(SessionRecord {
        session_id: SessionId::new(row.try_get::<String, _>("id")?),
        username: row.try_get("username")?,
        creation_time: row.try_get("creation_time")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn add_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_table (username, password_hash) VALUES ($1, $2)")
            .bind(&user.username)
            .bind(&user.password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_err(e, "user_table", &user.username))?;
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT username, password_hash FROM user_table WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(User {
                username: row.try_get("username")?,
                password_hash: row.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    async fn add_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO session_table (id, username, creation_time) VALUES ($1, $2, $3)")
            .bind(session.session_id.as_str())
            .bind(&session.username)
            .bind(&session.creation_time)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_err(e, "session_table", session.session_id.as_str()))?;
        Ok(())
    }

    async fn get_session_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query("SELECT id, username, creation_time FROM session_table WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn get_sessions_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let rows =
            sqlx::query("SELECT id, username, creation_time FROM session_table WHERE username = $1")
                .bind(username)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn delete_session_by_id(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_table WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_task(&self, task: &TaskRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO task_table (id, task_name, parent_session_id, username, blend_file_path, state)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(task.task_id.as_str())
        .bind(&task.task_name)
        .bind(task.parent_session_id.as_str())
        .bind(&task.username)
        .bind(&task.blend_file_path)
        .bind(task.state.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "task_table", task.task_id.as_str()))?;
        Ok(())
    }

    async fn get_task_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, task_name, parent_session_id, username, blend_file_path, state
             FROM task_table WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_tasks_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, task_name, parent_session_id, username, blend_file_path, state
             FROM task_table WHERE parent_session_id = $1",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, task_name, parent_session_id, username, blend_file_path, state
             FROM task_table",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn update_task_state(&self, id: &TaskId, state: TaskState) -> Result<(), StoreError> {
        sqlx::query("UPDATE task_table SET state = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(state.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_task_by_id(&self, id: &TaskId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM task_table WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tasks_by_session_id(&self, session_id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM task_table WHERE parent_session_id = $1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
