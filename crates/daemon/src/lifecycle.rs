// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup tasks for the daemon binary.

use std::sync::Arc;

use tracing::warn;

use glacier_core::TaskState;
use glacier_store::{Store, StoreError};

/// Fail every task left non-terminal by a previous run.
///
/// Supervisors are not persisted, so a restart orphans any in-flight task:
/// nothing will ever advance it again. Mark such rows `FAILED(BLENDER)` at
/// boot; their scratch artifacts are released on first reference (task
/// delete or session cascade).
pub async fn fail_orphaned_tasks(store: &Arc<dyn Store>) -> Result<(), StoreError> {
    for task in store.list_tasks().await? {
        if task.state.is_terminal() {
            continue;
        }
        warn!(
            task_id = task.task_id.short(8),
            state = %task.state,
            "orphaned task from previous run, marking failed"
        );
        store
            .update_task_state(&task.task_id, TaskState::FailedBlender)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
