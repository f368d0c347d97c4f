//! Test helpers for behavioral specifications.
//!
//! Builds an in-process server over the in-memory store, with a stub
//! shell script standing in for the render binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use tempfile::TempDir;

use glacier_daemon::auth::{self, AuthManager};
use glacier_daemon::config::RenderConfig;
use glacier_daemon::listener::{self, ServerCtx};
use glacier_engine::{Scheduler, TaskRegistry};
use glacier_store::MemStore;

pub use glacier_store::Store;

pub const USER: &str = "qwerty";
pub const PASSWORD: &str = "12345";

/// Shortened verification budget so specs stay fast; the production value
/// is five seconds.
pub const TEST_VERIFY_BUDGET: Duration = Duration::from_millis(25);

/// How long to poll for a task state before giving up.
pub const STATE_WAIT_MAX: Duration = Duration::from_secs(10);

/// Stub render binary: resolves its `-o` output directory, emits progress
/// lines, and writes one frame file.
pub const RENDER_OK: &str = r#"out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
echo "Fra:1 Mem:10.00M | Rendering"
echo "frame one" > "$out/frame0001.png"
echo "Saved: $out/frame0001.png""#;

/// Stub render binary that renders until killed.
pub const RENDER_HANG: &str = "echo started\nsleep 60";

/// One in-process backend: server, store, scratch directory.
pub struct Spec {
    pub server: TestServer,
    pub store: Arc<dyn Store>,
    pub scratch: TempDir,
}

/// Spin up a backend whose render binary is the given script body, with
/// the default user provisioned.
pub async fn spec_with_script(script: &str) -> Spec {
    let scratch = tempfile::tempdir().unwrap();
    let blender_bin = write_script(scratch.path(), script);

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    auth::add_user(&store, USER, PASSWORD).await.unwrap();

    let registry = Arc::new(TaskRegistry::new());
    let auth_mgr = Arc::new(
        AuthManager::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            RenderConfig {
                upload_facility: scratch.path().to_path_buf(),
                blender_bin,
            },
        )
        .with_verify_budget(TEST_VERIFY_BUDGET),
    );
    tokio::spawn(Scheduler::new(registry).run());

    let server =
        TestServer::new(listener::router(Arc::new(ServerCtx { auth: auth_mgr }))).unwrap();
    Spec {
        server,
        store,
        scratch,
    }
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-blender.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

impl Spec {
    /// Log the default user in and return the session id.
    pub async fn login(&self) -> String {
        let res = self.login_as(USER, PASSWORD).await;
        assert_eq!(res.status_code().as_u16(), 200);
        res.json::<serde_json::Value>()["session_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn login_as(&self, username: &str, password: &str) -> TestResponse {
        self.server
            .get("/login")
            .add_query_param("username", username)
            .add_query_param("password", password)
            .await
    }

    /// Upload a stub scene and request a render.
    pub async fn spawn_task(
        &self,
        session_id: &str,
        task_name: &str,
        start_frame: &str,
        end_frame: &str,
    ) -> TestResponse {
        self.server
            .post("/task/request")
            .add_query_param("session_id", session_id)
            .add_query_param("task_name", task_name)
            .add_query_param("start_frame", start_frame)
            .add_query_param("end_frame", end_frame)
            .multipart(
                MultipartForm::new()
                    .add_part("file", Part::bytes(b"stub scene".to_vec()).file_name("cube.blend")),
            )
            .await
    }

    pub async fn stat(&self, session_id: &str, task_id: &str) -> TestResponse {
        self.server
            .get("/task/stat")
            .add_query_param("session_id", session_id)
            .add_query_param("task_id", task_id)
            .await
    }

    pub async fn task_list(&self, session_id: &str) -> TestResponse {
        self.server
            .get("/task/list")
            .add_query_param("session_id", session_id)
            .await
    }

    /// Poll `/task/stat` until the task reaches `want`, returning the
    /// distinct states observed on the way (including `want`).
    pub async fn wait_for_task_state(
        &self,
        session_id: &str,
        task_id: &str,
        want: &str,
    ) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + STATE_WAIT_MAX;
        let mut observed: Vec<String> = Vec::new();
        loop {
            let res = self.stat(session_id, task_id).await;
            assert_eq!(res.status_code().as_u16(), 200);
            let state = res.json::<serde_json::Value>()["state"]
                .as_str()
                .unwrap()
                .to_string();
            if observed.last() != Some(&state) {
                observed.push(state.clone());
            }
            if state == want {
                return observed;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {want}, observed {observed:?}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
