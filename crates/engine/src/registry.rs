// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory map of live task supervisors.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use glacier_core::TaskId;

use crate::render::Renderer;

/// Insertion-ordered map of task supervisors, shared between the HTTP
/// handlers (create, kill, delete) and the scheduler (iteration).
///
/// The scheduler iterates a [`snapshot`](TaskRegistry::snapshot), so
/// long-running packaging never holds the lock and deletion cannot race a
/// tick.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<IndexMap<TaskId, Arc<Renderer>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, renderer: Arc<Renderer>) {
        self.tasks
            .lock()
            .insert(renderer.task_id().clone(), renderer);
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<Renderer>> {
        self.tasks.lock().get(task_id).cloned()
    }

    pub fn remove(&self, task_id: &str) -> Option<Arc<Renderer>> {
        self.tasks.lock().shift_remove(task_id)
    }

    /// Clone out the supervisors in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Renderer>> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
