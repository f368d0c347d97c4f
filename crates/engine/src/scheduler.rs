// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler loop that drives tasks through the state machine.

use std::sync::Arc;
use std::time::Duration;

use glacier_core::TaskState;

use crate::registry::TaskRegistry;

/// Delay between scheduler passes.
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// The single long-running loop that advances every known task: starting
/// renders for `SCHEDULED` tasks and packaging `COMPLETED` ones. These two
/// transitions originate here and nowhere else.
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
}

impl Scheduler {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    /// One pass over the registry in insertion order.
    ///
    /// `render` is non-blocking (the render work runs on the supervisor's
    /// own worker); `pack_output` blocks the pass for the duration of the
    /// tar, which is acceptable since this loop is not latency-critical.
    pub async fn tick(&self) {
        for task in self.registry.snapshot() {
            match task.state() {
                TaskState::Scheduled => task.render(),
                TaskState::Completed => {
                    if let Err(e) = task.pack_output().await {
                        tracing::warn!(
                            task_id = %task.task_id(),
                            error = %e,
                            "packaging failed"
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// Run forever. Nothing in a pass can stop the loop; a failed store
    /// write leaves the row in its pre-update state and the transition is
    /// re-driven on a later pass.
    pub async fn run(self) {
        tracing::info!("task scheduler start");
        let mut was_busy = false;
        loop {
            let busy = !self.registry.is_empty();
            match (was_busy, busy) {
                (false, true) => tracing::info!("full scheduler cycle"),
                (true, false) => tracing::info!("empty scheduler cycle"),
                _ => {}
            }
            was_busy = busy;

            if busy {
                self.tick().await;
            }
            tokio::time::sleep(TICK_INTERVAL).await;
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
