// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests.
//!
//! Same duplicate and cascade semantics as the PostgreSQL implementation,
//! backed by mutex-guarded collections. Task rows keep insertion order,
//! which the scheduler tests rely on.

use async_trait::async_trait;
use parking_lot::Mutex;

use glacier_core::{SessionId, SessionRecord, TaskId, TaskRecord, TaskState, User};

use crate::{Store, StoreError};

/// Test-only [`Store`] backed by process memory.
#[derive(Default)]
pub struct MemStore {
    users: Mutex<Vec<User>>,
    sessions: Mutex<Vec<SessionRecord>>,
    tasks: Mutex<Vec<TaskRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn add_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate {
                table: "user_table",
                key: user.username.clone(),
            });
        }
        users.push(user.clone());
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn add_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| s.session_id == session.session_id) {
            return Err(StoreError::Duplicate {
                table: "session_table",
                key: session.session_id.to_string(),
            });
        }
        sessions.push(session.clone());
        Ok(())
    }

    async fn get_session_by_id(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .find(|s| &s.session_id == id)
            .cloned())
    }

    async fn get_sessions_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .filter(|s| s.username == username)
            .cloned()
            .collect())
    }

    async fn delete_session_by_id(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.lock().retain(|s| &s.session_id != id);
        Ok(())
    }

    async fn add_task(&self, task: &TaskRecord) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock();
        if tasks.iter().any(|t| t.task_id == task.task_id) {
            return Err(StoreError::Duplicate {
                table: "task_table",
                key: task.task_id.to_string(),
            });
        }
        tasks.push(task.clone());
        Ok(())
    }

    async fn get_task_by_id(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.tasks.lock().iter().find(|t| &t.task_id == id).cloned())
    }

    async fn get_tasks_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| &t.parent_session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        Ok(self.tasks.lock().clone())
    }

    async fn update_task_state(&self, id: &TaskId, state: TaskState) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock();
        if let Some(task) = tasks.iter_mut().find(|t| &t.task_id == id) {
            task.state = state;
        }
        Ok(())
    }

    async fn delete_task_by_id(&self, id: &TaskId) -> Result<(), StoreError> {
        self.tasks.lock().retain(|t| &t.task_id != id);
        Ok(())
    }

    async fn delete_tasks_by_session_id(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.tasks
            .lock()
            .retain(|t| &t.parent_session_id != session_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
