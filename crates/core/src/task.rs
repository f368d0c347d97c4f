// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifier, durable record, and state machine.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a render task.
    ///
    /// Minted as 32 hex characters (128 random bits) when the task is
    /// created, and used to key the scratch files, the database row, and
    /// the in-memory supervisor.
    pub struct TaskId;
}

/// Lifecycle state of a render task.
///
/// Serialized to the literal strings the database and the API use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Row persisted, supervisor not yet constructed. Synthetic: replaced
    /// by `Scheduled` before the task is ever observable via the API.
    #[serde(rename = "CREATED")]
    Created,
    /// Waiting for the scheduler to start the render.
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    /// Render child process is running.
    #[serde(rename = "RUNNING")]
    Running,
    /// Render finished with exit code 0; output not yet packaged.
    #[serde(rename = "COMPLETED")]
    Completed,
    /// Output directory is being packed into a tar.
    #[serde(rename = "COMPRESSING")]
    Compressing,
    /// Packaged artifact is ready for download.
    #[serde(rename = "PACKED")]
    Packed,
    /// Result was downloaded. Terminal.
    #[serde(rename = "DONE")]
    Done,
    /// Cancelled by the client while rendering. Terminal.
    #[serde(rename = "KILLED")]
    Killed,
    /// Render child process exited non-zero. Terminal.
    #[serde(rename = "FAILED(BLENDER)")]
    FailedBlender,
    /// Packaging failed. Terminal.
    #[serde(rename = "FAILED(TAR)")]
    FailedTar,
}

impl TaskState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Killed | TaskState::FailedBlender | TaskState::FailedTar
        )
    }

    /// Whether the state machine permits `self -> to`.
    ///
    /// ```text
    /// CREATED -> SCHEDULED -> RUNNING -> COMPLETED -> COMPRESSING -> PACKED -> DONE
    ///                         RUNNING -> KILLED | FAILED(BLENDER)
    ///                         COMPRESSING -> FAILED(TAR)
    /// ```
    pub fn can_advance_to(self, to: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, to),
            (Created, Scheduled)
                | (Scheduled, Running)
                | (Running, Completed)
                | (Running, Killed)
                | (Running, FailedBlender)
                | (Completed, Compressing)
                | (Compressing, Packed)
                | (Compressing, FailedTar)
                | (Packed, Done)
        )
    }

    /// The literal state string stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Created => "CREATED",
            TaskState::Scheduled => "SCHEDULED",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Compressing => "COMPRESSING",
            TaskState::Packed => "PACKED",
            TaskState::Done => "DONE",
            TaskState::Killed => "KILLED",
            TaskState::FailedBlender => "FAILED(BLENDER)",
            TaskState::FailedTar => "FAILED(TAR)",
        }
    }

    /// All states, in pipeline order.
    pub fn all() -> [TaskState; 10] {
        use TaskState::*;
        [
            Created,
            Scheduled,
            Running,
            Completed,
            Compressing,
            Packed,
            Done,
            Killed,
            FailedBlender,
            FailedTar,
        ]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a state string does not name a known task state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);

impl FromStr for TaskState {
    type Err = ParseTaskStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskState::all()
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseTaskStateError(s.to_string()))
    }
}

/// Durable task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    /// Client-supplied label, opaque to the server.
    pub task_name: String,
    pub parent_session_id: SessionId,
    /// Denormalized from the parent session at creation time.
    pub username: String,
    /// Absolute path of the uploaded scene file in the scratch directory.
    pub blend_file_path: String,
    pub state: TaskState,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
