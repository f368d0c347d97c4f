// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Password verification, session issuance, and task lifecycle.
//!
//! The [`AuthManager`] is the one component that touches the store, the
//! scratch filesystem, and the supervisor registry together; HTTP handlers
//! stay thin wrappers over it. Supervisor transitions flow back into the
//! store through the [`StateSink`] it hands each supervisor.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use glacier_core::{
    creation_timestamp, hex_token, SessionId, SessionRecord, TaskId, TaskRecord, TaskState, User,
    TOKEN_BYTES,
};
use glacier_engine::{Renderer, RenderError, StateSink, TaskRegistry};
use glacier_store::{Store, StoreError};

use crate::config::RenderConfig;

/// Fixed time budget for a password verification call.
///
/// The call returns only once the budget has elapsed, whether the user
/// exists or not, so response timing does not reveal which usernames are
/// provisioned.
pub const VERIFY_BUDGET: Duration = Duration::from_secs(5);

/// Errors from the auth layer.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("failed to write scene file: {0}")]
    SceneWrite(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Hash a password into an argon2 PHC string (salt and parameters
/// embedded). Runs on the blocking pool; argon2 is memory-hard by design.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        Argon2::default()
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}

/// Provision a user. Refuses existing usernames, leaving them untouched.
pub async fn add_user(
    store: &Arc<dyn Store>,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    if store.get_user_by_username(username).await?.is_some() {
        return Err(AuthError::UserExists(username.to_string()));
    }
    let password_hash = hash_password(password).await?;
    store
        .add_user(&User {
            username: username.to_string(),
            password_hash,
        })
        .await?;
    Ok(())
}

/// [`StateSink`] handed to every supervisor: persists the transition and
/// emits the log line. A separate struct rather than the manager itself so
/// supervisors never hold a reference cycle back into the auth layer.
struct StoreSink {
    store: Arc<dyn Store>,
}

#[async_trait]
impl StateSink for StoreSink {
    async fn update(&self, task_id: &TaskId, state: TaskState) {
        info!(task_id = task_id.short(8), state = %state, "task state changed");
        if let Err(e) = self.store.update_task_state(task_id, state).await {
            // The row keeps its pre-update state; scheduler-driven
            // transitions are re-issued on a later pass.
            warn!(task_id = task_id.short(8), error = %e, "failed to persist task state");
        }
    }
}

/// Sessions, tasks, and credentials over the store and the registry.
pub struct AuthManager {
    store: Arc<dyn Store>,
    registry: Arc<TaskRegistry>,
    render_config: RenderConfig,
    sink: Arc<dyn StateSink>,
    verify_budget: Duration,
}

impl AuthManager {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<TaskRegistry>,
        render_config: RenderConfig,
    ) -> Self {
        let sink: Arc<dyn StateSink> = Arc::new(StoreSink {
            store: Arc::clone(&store),
        });
        Self {
            store,
            registry,
            render_config,
            sink,
            verify_budget: VERIFY_BUDGET,
        }
    }

    /// Same manager with a shortened verification budget. Test hook: the
    /// production budget makes every login take five seconds.
    pub fn with_verify_budget(mut self, budget: Duration) -> Self {
        self.verify_budget = budget;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Check credentials within the fixed time budget.
    ///
    /// The deadline is computed once at entry from the monotonic clock and
    /// honoured on every path, including unknown users and store failures.
    pub async fn verify_password(
        &self,
        username: &str,
        candidate: &str,
    ) -> Result<bool, StoreError> {
        let deadline = tokio::time::Instant::now() + self.verify_budget;

        let user = self.store.get_user_by_username(username).await;
        let correct = match &user {
            Ok(Some(user)) => {
                let password_hash = user.password_hash.clone();
                let candidate = candidate.to_string();
                tokio::task::spawn_blocking(move || {
                    PasswordHash::new(&password_hash)
                        .map(|parsed| {
                            Argon2::default()
                                .verify_password(candidate.as_bytes(), &parsed)
                                .is_ok()
                        })
                        .unwrap_or(false)
                })
                .await
                .unwrap_or(false)
            }
            Ok(None) => false,
            Err(_) => false,
        };

        tokio::time::sleep_until(deadline).await;
        user.map(|_| correct)
    }

    /// Issue or return the user's session after verifying credentials.
    ///
    /// `None` means bad credentials. A username has at most one session,
    /// so repeated logins return the same id.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<SessionId>, StoreError> {
        if !self.verify_password(username, password).await? {
            return Ok(None);
        }

        if let Some(existing) = self
            .store
            .get_sessions_by_username(username)
            .await?
            .into_iter()
            .next()
        {
            return Ok(Some(existing.session_id));
        }

        let session = SessionRecord {
            session_id: SessionId::new(hex_token(TOKEN_BYTES)),
            username: username.to_string(),
            creation_time: creation_timestamp(),
        };
        self.store.add_session(&session).await?;
        info!(username, session_id = session.session_id.short(8), "session created");
        Ok(Some(session.session_id))
    }

    pub async fn session(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.store.get_session_by_id(session_id).await
    }

    /// Spawn a task: write the upload, persist the row, construct and
    /// register the supervisor (which fires the `SCHEDULED` transition).
    pub async fn add_task(
        &self,
        task_name: &str,
        parent_session_id: &SessionId,
        blend_bytes: &[u8],
        start_frame: u32,
        end_frame: u32,
    ) -> Result<TaskId, AuthError> {
        let session = self
            .store
            .get_session_by_id(parent_session_id)
            .await?
            .ok_or_else(|| AuthError::UnknownSession(parent_session_id.to_string()))?;

        let task_id = TaskId::new(hex_token(TOKEN_BYTES));
        let blend_file_path = self
            .render_config
            .upload_facility
            .join(format!("{task_id}.blend"));
        tokio::fs::write(&blend_file_path, blend_bytes)
            .await
            .map_err(AuthError::SceneWrite)?;

        self.store
            .add_task(&TaskRecord {
                task_id: task_id.clone(),
                task_name: task_name.to_string(),
                parent_session_id: parent_session_id.clone(),
                username: session.username,
                blend_file_path: blend_file_path.display().to_string(),
                state: TaskState::Created,
            })
            .await?;

        let renderer = Renderer::new(
            task_id.clone(),
            blend_file_path,
            start_frame,
            end_frame,
            self.render_config.upload_facility.clone(),
            self.render_config.blender_bin.clone(),
            Arc::clone(&self.sink),
        )
        .await?;
        self.registry.insert(renderer);

        info!(task_id = task_id.short(8), task_name, "task registered");
        Ok(task_id)
    }

    /// Kill the supervisor (if any), release scratch files, delete the row.
    pub async fn delete_task(&self, task: &TaskRecord) -> Result<(), AuthError> {
        if let Some(renderer) = self.registry.remove(task.task_id.as_str()) {
            renderer.shutdown().await;
            renderer.cleanup().await;
        } else {
            // Row from a previous run: no supervisor, but its recorded
            // scratch artifacts may still exist.
            remove_scratch(&self.render_config.upload_facility, task).await;
        }
        self.store.delete_task_by_id(&task.task_id).await?;
        info!(task_id = task.task_id.short(8), "task deleted");
        Ok(())
    }

    /// Delete a session and cascade to every task it owns.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<(), AuthError> {
        for task in self.store.get_tasks_by_session_id(session_id).await? {
            if let Some(renderer) = self.registry.remove(task.task_id.as_str()) {
                renderer.shutdown().await;
                renderer.cleanup().await;
            } else {
                remove_scratch(&self.render_config.upload_facility, &task).await;
            }
        }
        self.store.delete_tasks_by_session_id(session_id).await?;
        self.store.delete_session_by_id(session_id).await?;
        info!(session_id = session_id.short(8), "session deleted");
        Ok(())
    }
}

/// Best-effort removal of a task's recorded scratch artifacts.
async fn remove_scratch(upload_facility: &Path, task: &TaskRecord) {
    let _ = tokio::fs::remove_file(&task.blend_file_path).await;
    let _ = tokio::fs::remove_dir_all(upload_facility.join(task.task_id.as_str())).await;
    let _ = tokio::fs::remove_file(upload_facility.join(format!("{}.tar.gz", task.task_id))).await;
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
