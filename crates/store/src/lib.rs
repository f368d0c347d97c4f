// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! glacier-store: durable storage for users, sessions, and render tasks.
//!
//! The [`Store`] trait is the seam between the server and the database.
//! Production uses [`PgStore`]; tests use the in-memory implementation
//! behind the `test-support` feature.

pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use glacier_core::{ParseTaskStateError, SessionId, SessionRecord, TaskId, TaskRecord, TaskState, User};
use thiserror::Error;

pub use postgres::{PgConfig, PgStore};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemStore;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit an existing primary key. The server gates on pre-reads,
    /// so this is a defensive signal, kept distinguishable from other
    /// database failures.
    #[error("duplicate key in {table}: {key}")]
    Duplicate { table: &'static str, key: String },

    #[error("database endpoint did not accept connections within {0:?}")]
    ConnectTimeout(Duration),

    #[error(transparent)]
    State(#[from] ParseTaskStateError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Typed accessors over the durable tables.
///
/// All operations are single statements; the only read-modify-write the
/// server performs is the WHERE-guarded task state update, so callers
/// never need explicit transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn add_user(&self, user: &User) -> Result<(), StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn add_session(&self, session: &SessionRecord) -> Result<(), StoreError>;
    async fn get_session_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;
    async fn get_sessions_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<SessionRecord>, StoreError>;
    async fn delete_session_by_id(&self, id: &SessionId) -> Result<(), StoreError>;

    async fn add_task(&self, task: &TaskRecord) -> Result<(), StoreError>;
    async fn get_task_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError>;
    async fn get_tasks_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<TaskRecord>, StoreError>;
    /// Every task row, used by startup recovery.
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError>;
    async fn update_task_state(&self, id: &TaskId, state: TaskState) -> Result<(), StoreError>;
    async fn delete_task_by_id(&self, id: &TaskId) -> Result<(), StoreError>;
    async fn delete_tasks_by_session_id(&self, session_id: &SessionId) -> Result<(), StoreError>;
}
