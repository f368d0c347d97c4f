// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use glacier_core::{hex_token, TaskId, TaskState, TOKEN_BYTES};

use crate::render::Renderer;
use crate::sink::StateSink;

/// Sink that records every transition it receives.
#[derive(Default)]
pub struct RecordingSink {
    states: Mutex<Vec<(TaskId, TaskState)>>,
}

impl RecordingSink {
    pub fn states(&self) -> Vec<TaskState> {
        self.states.lock().iter().map(|(_, s)| *s).collect()
    }
}

#[async_trait]
impl StateSink for RecordingSink {
    async fn update(&self, task_id: &TaskId, state: TaskState) {
        self.states.lock().push((task_id.clone(), state));
    }
}

/// Script body that resolves its `-o` output directory, emits progress
/// lines, and writes one frame file before exiting successfully.
pub const RENDER_OK: &str = r#"out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
echo "Fra:1 Mem:10.00M | Rendering"
echo "frame one" > "$out/frame0001.png"
echo "Saved: $out/frame0001.png""#;

/// Script body that fails like a crashing render binary.
pub const RENDER_FAIL: &str = "echo boom >&2\nexit 3";

/// Script body that renders forever (until killed).
pub const RENDER_HANG: &str = "echo started\nsleep 60";

/// Write an executable shell script standing in for the render binary.
pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-blender.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Build a supervisor over `scratch` whose render binary is `body`.
pub async fn renderer_with_script(
    scratch: &Path,
    body: &str,
    sink: Arc<RecordingSink>,
) -> Arc<Renderer> {
    let task_id = TaskId::new(hex_token(TOKEN_BYTES));
    let blend = scratch.join(format!("{task_id}.blend"));
    std::fs::write(&blend, b"not a real scene").unwrap();
    let bin = write_script(scratch, body);
    Renderer::new(
        task_id,
        blend,
        1,
        1,
        scratch.to_path_buf(),
        bin,
        sink,
    )
    .await
    .unwrap()
}

/// Poll until the supervisor reaches `want` or five seconds elapse.
pub async fn wait_for_state(renderer: &Renderer, want: TaskState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let state = renderer.state();
        if state == want {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {want}, still {state}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
