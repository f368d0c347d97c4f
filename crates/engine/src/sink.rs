// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State update seam between supervisors and durable storage.

use async_trait::async_trait;
use glacier_core::{TaskId, TaskState};

/// Receives every task state transition.
///
/// Implemented by the auth layer, which persists the new state and emits a
/// log line. Supervisors hold only this trait object, never the storage
/// itself, so the engine stays free of database concerns.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn update(&self, task_id: &TaskId, state: TaskState);
}
