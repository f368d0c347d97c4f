// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task subprocess supervision.
//!
//! A [`Renderer`] owns one render child process: it spawns the binary,
//! streams its output as the client-visible progress line, honours kill
//! requests, packages finished frames into a gzipped tar, and reports
//! every state transition through the [`StateSink`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use glacier_core::{TaskId, TaskState};

use crate::device::RenderDevice;
use crate::error::RenderError;
use crate::sink::StateSink;

/// How often the worker re-checks the kill flag while waiting on the child.
const KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Supervises a single render task from `SCHEDULED` to a terminal state.
///
/// One supervisor exists per task id, created together with the task row
/// and destroyed when the task is deleted. The scheduler starts the render
/// and the packaging; the worker spawned by [`Renderer::render`] owns the
/// child process until it exits or is killed.
pub struct Renderer {
    task_id: TaskId,
    blend_file_path: PathBuf,
    output_dir: PathBuf,
    scratch_dir: PathBuf,
    blender_bin: PathBuf,
    start_frame: u32,
    end_frame: u32,
    device: RenderDevice,
    sink: Arc<dyn StateSink>,
    state: Mutex<TaskState>,
    /// Most recent non-empty output line; the progress proxy.
    last_line: Mutex<String>,
    tar_path: Mutex<Option<PathBuf>>,
    killed: AtomicBool,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Handle back to the owning `Arc`, used to hand the worker an owned
    /// reference when the render starts.
    weak: Weak<Renderer>,
}

impl Renderer {
    /// Create the supervisor for a freshly persisted task.
    ///
    /// Creates `<scratch>/<task_id>/` and fires the `SCHEDULED` transition
    /// before returning.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        task_id: TaskId,
        blend_file_path: PathBuf,
        start_frame: u32,
        end_frame: u32,
        scratch_dir: PathBuf,
        blender_bin: PathBuf,
        sink: Arc<dyn StateSink>,
    ) -> Result<Arc<Self>, RenderError> {
        let output_dir = scratch_dir.join(task_id.as_str());
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| RenderError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let renderer = Arc::new_cyclic(|weak| Self {
            task_id,
            blend_file_path,
            output_dir,
            scratch_dir,
            blender_bin,
            start_frame,
            end_frame,
            device: RenderDevice::detect(),
            sink,
            state: Mutex::new(TaskState::Created),
            last_line: Mutex::new(String::new()),
            tar_path: Mutex::new(None),
            killed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
            weak: weak.clone(),
        });
        renderer.transition(TaskState::Scheduled).await;
        Ok(renderer)
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Last non-empty output line of the render child.
    pub fn progress(&self) -> String {
        self.last_line.lock().clone()
    }

    /// Path of the packaged artifact, set once packaging succeeds.
    pub fn tar_path(&self) -> Option<PathBuf> {
        self.tar_path.lock().clone()
    }

    /// Apply a transition and push it to the sink before returning.
    ///
    /// Transitions the state machine does not permit are refused, which is
    /// what makes kill and repeated scheduler calls idempotent in terminal
    /// states.
    async fn transition(&self, to: TaskState) {
        {
            let mut state = self.state.lock();
            if !state.can_advance_to(to) {
                tracing::debug!(
                    task_id = %self.task_id.short(8),
                    from = %state,
                    to = %to,
                    "transition refused"
                );
                return;
            }
            *state = to;
        }
        self.sink.update(&self.task_id, to).await;
    }

    /// Idempotent start: the first call spawns the render worker, later
    /// calls are no-ops.
    pub fn render(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let handle = tokio::spawn(this.run_render());
        *self.worker.lock() = Some(handle);
    }

    /// Worker body: spawn the child, stream its output, wait for exit or
    /// kill. Blocks only its own task.
    async fn run_render(self: Arc<Self>) {
        let mut child = match Command::new(&self.blender_bin)
            .arg("-b")
            .arg(&self.blend_file_path)
            .arg("-E")
            .arg("CYCLES")
            .arg("-o")
            // Trailing separator: the render binary treats a bare path as
            // a filename prefix, not a directory.
            .arg(format!("{}/", self.output_dir.display()))
            .arg("-noaudio")
            .arg("-s")
            .arg(self.start_frame.to_string())
            .arg("-e")
            .arg(self.end_frame.to_string())
            .arg("-a")
            .arg("--")
            .arg("--cycles-device")
            .arg(self.device.as_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    task_id = %self.task_id,
                    bin = %self.blender_bin.display(),
                    error = %e,
                    "failed to spawn render binary"
                );
                self.transition(TaskState::Running).await;
                self.transition(TaskState::FailedBlender).await;
                return;
            }
        };
        self.transition(TaskState::Running).await;

        // stdout and stderr feed the same progress line, matching the
        // merged stream the render binary contract describes.
        if let Some(stdout) = child.stdout.take() {
            Self::spawn_line_reader(Arc::clone(&self), stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            Self::spawn_line_reader(Arc::clone(&self), stderr);
        }

        loop {
            if self.killed.load(Ordering::SeqCst) {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(task_id = %self.task_id, error = %e, "kill signal failed");
                }
                let _ = child.wait().await;
                self.transition(TaskState::Killed).await;
                return;
            }

            // Child::wait is cancel safe, so a timed-out wait can simply be
            // retried on the next iteration.
            match tokio::time::timeout(KILL_POLL_INTERVAL, child.wait()).await {
                Ok(Ok(status)) => {
                    let next = if status.success() {
                        TaskState::Completed
                    } else {
                        tracing::info!(
                            task_id = %self.task_id,
                            exit_code = status.code(),
                            "render binary exited with failure"
                        );
                        TaskState::FailedBlender
                    };
                    self.transition(next).await;
                    return;
                }
                Ok(Err(e)) => {
                    tracing::error!(task_id = %self.task_id, error = %e, "waiting on render child failed");
                    self.transition(TaskState::FailedBlender).await;
                    return;
                }
                Err(_) => {} // poll window elapsed, re-check the kill flag
            }
        }
    }

    fn spawn_line_reader(this: Arc<Self>, stream: impl AsyncRead + Unpin + Send + 'static) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if !line.is_empty() {
                    *this.last_line.lock() = line.to_string();
                }
            }
        });
    }

    /// Request cancellation. The worker observes the flag on its next poll
    /// iteration; no-op in terminal states.
    pub fn kill(&self) {
        if self.state().is_terminal() {
            return;
        }
        self.killed.store(true, Ordering::SeqCst);
    }

    /// Kill the child (if running) and wait for the worker to finish.
    pub async fn shutdown(&self) {
        self.kill();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Package the finished frames into `<scratch>/<task_id>.tar.gz`.
    ///
    /// Scheduler-invoked on `COMPLETED`; synchronous from the scheduler's
    /// perspective, which may hold a tick for the duration of the tar.
    pub async fn pack_output(&self) -> Result<(), RenderError> {
        self.transition(TaskState::Compressing).await;

        let tar_path = self.scratch_dir.join(format!("{}.tar.gz", self.task_id));
        let status = Command::new("tar")
            .arg("-zcf")
            .arg(&tar_path)
            .arg("--directory")
            .arg(&self.output_dir)
            .arg(".")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                *self.tar_path.lock() = Some(tar_path);
                self.transition(TaskState::Packed).await;
                Ok(())
            }
            Ok(status) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    exit_code = status.code(),
                    "tar exited with failure"
                );
                self.transition(TaskState::FailedTar).await;
                Ok(())
            }
            Err(e) => {
                self.transition(TaskState::FailedTar).await;
                Err(RenderError::Tar(e))
            }
        }
    }

    /// Mark the packaged result as delivered. `PACKED -> DONE`.
    pub async fn done(&self) {
        self.transition(TaskState::Done).await;
    }

    /// Remove the uploaded scene, the output directory, and the tar.
    ///
    /// Best-effort: missing files are fine, other failures are logged.
    pub async fn cleanup(&self) {
        remove_file_logged(&self.blend_file_path).await;
        let tar_path = self.tar_path.lock().clone();
        if let Some(tar_path) = tar_path {
            remove_file_logged(&tar_path).await;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.output_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.output_dir.display(), error = %e, "scratch cleanup failed");
            }
        }
    }
}

async fn remove_file_logged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "scratch cleanup failed");
        }
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
