//! Render lifecycle over the API: spawn, poll, fetch, kill, delete.

use crate::prelude::*;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[tokio::test(flavor = "multi_thread")]
async fn spawn_poll_fetch() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    let res = spec.spawn_task(&session_id, "cube", "1", "1").await;
    assert_eq!(res.status_code().as_u16(), 200);
    let task_id = res.json::<serde_json::Value>()["task_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(task_id.len(), 32);

    // Observed states walk the pipeline in order, no repeats.
    let observed = spec
        .wait_for_task_state(&session_id, &task_id, "PACKED")
        .await;
    let pipeline = ["SCHEDULED", "RUNNING", "COMPLETED", "COMPRESSING", "PACKED"];
    let mut last_index = 0;
    for state in &observed {
        let index = pipeline
            .iter()
            .position(|p| p == state)
            .unwrap_or_else(|| panic!("unexpected state {state}"));
        assert!(index >= last_index, "out of order: {observed:?}");
        last_index = index;
    }

    // The stat row carries the progress proxy from the stub's output.
    let res = spec.stat(&session_id, &task_id).await;
    let progress = res.json::<serde_json::Value>()["progress"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(progress.starts_with("Saved:"), "progress was {progress:?}");

    // Fetch the packaged result: gzip bytes, then the task is DONE.
    let res = spec
        .server
        .get("/task/result")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", &task_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 200);
    let bytes = res.as_bytes();
    assert!(bytes.len() > GZIP_MAGIC.len());
    assert_eq!(&bytes[..2], &GZIP_MAGIC);

    let res = spec.stat(&session_id, &task_id).await;
    assert_eq!(res.json::<serde_json::Value>()["state"], "DONE");

    // A second download finds the task past PACKED.
    let res = spec
        .server
        .get("/task/result")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", &task_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 400);
    assert_eq!(res.text(), "Task is not packed");
}

#[tokio::test(flavor = "multi_thread")]
async fn result_before_packed_is_a_bad_request() {
    let spec = spec_with_script(RENDER_HANG).await;
    let session_id = spec.login().await;

    let res = spec.spawn_task(&session_id, "cube", "1", "1000").await;
    let task_id = res.json::<serde_json::Value>()["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = spec
        .server
        .get("/task/result")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", &task_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_mid_render_converges_quickly() {
    let spec = spec_with_script(RENDER_HANG).await;
    let session_id = spec.login().await;

    let res = spec.spawn_task(&session_id, "cube", "1", "1000").await;
    let task_id = res.json::<serde_json::Value>()["task_id"]
        .as_str()
        .unwrap()
        .to_string();
    spec.wait_for_task_state(&session_id, &task_id, "RUNNING")
        .await;

    let killed_at = tokio::time::Instant::now();
    let res = spec
        .server
        .get("/task/kill")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", &task_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 200);

    spec.wait_for_task_state(&session_id, &task_id, "KILLED")
        .await;
    assert!(killed_at.elapsed() < std::time::Duration::from_secs(2));

    // Kill is idempotent: more kills leave the state alone.
    for _ in 0..3 {
        let res = spec
            .server
            .get("/task/kill")
            .add_query_param("session_id", &session_id)
            .add_query_param("task_id", &task_id)
            .await;
        assert_eq!(res.status_code().as_u16(), 200);
    }
    let res = spec.stat(&session_id, &task_id).await;
    assert_eq!(res.json::<serde_json::Value>()["state"], "KILLED");
}

#[tokio::test(flavor = "multi_thread")]
async fn non_digit_frames_are_forbidden() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    for (start, end) in [("abc", "1"), ("1", "abc"), ("-1", "5"), ("1.5", "5")] {
        let res = spec.spawn_task(&session_id, "cube", start, end).await;
        assert_eq!(res.status_code().as_u16(), 403, "{start:?}..{end:?}");
        assert_eq!(res.text(), "Non-digit frames");
    }

    // Nothing was created.
    let res = spec.task_list(&session_id).await;
    assert_eq!(res.json::<serde_json::Value>(), serde_json::json!([]));
    assert!(spec.store.list_tasks().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_the_task() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    let res = spec.spawn_task(&session_id, "cube", "1", "1").await;
    let task_id = res.json::<serde_json::Value>()["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = spec.task_list(&session_id).await;
    assert_eq!(res.json::<serde_json::Value>().as_array().unwrap().len(), 1);

    let res = spec
        .server
        .get("/task/delete")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", &task_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 200);

    let res = spec.task_list(&session_id).await;
    assert_eq!(res.json::<serde_json::Value>(), serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn operations_on_unknown_tasks() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    let res = spec
        .server
        .get("/task/delete")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", "cafebabe")
        .await;
    assert_eq!(res.status_code().as_u16(), 404);
    assert_eq!(res.text(), "Task does not exist");

    let res = spec
        .server
        .get("/task/kill")
        .add_query_param("session_id", &session_id)
        .add_query_param("task_id", "cafebabe")
        .await;
    assert_eq!(res.status_code().as_u16(), 404);

    let res = spec.stat(&session_id, "cafebabe").await;
    assert_eq!(res.status_code().as_u16(), 401);
}
