//! Session listing, removal, and the task cascade.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn session_list_shows_the_live_session() {
    let spec = spec_with_script(RENDER_OK).await;

    let res = spec
        .server
        .get("/session/list")
        .add_query_param("username", USER)
        .add_query_param("password", PASSWORD)
        .await;
    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(
        res.json::<serde_json::Value>()["sessions"],
        serde_json::json!([])
    );

    let session_id = spec.login().await;
    let res = spec
        .server
        .get("/session/list")
        .add_query_param("username", USER)
        .add_query_param("password", PASSWORD)
        .await;
    let body = res.json::<serde_json::Value>();
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["session_id"], session_id.as_str());
    assert_eq!(sessions[0]["username"], USER);

    let res = spec
        .server
        .get("/session/list")
        .add_query_param("username", USER)
        .add_query_param("password", "wrong")
        .await;
    assert_eq!(res.status_code().as_u16(), 401);
}

#[tokio::test(flavor = "multi_thread")]
async fn session_remove_cascades_to_its_tasks() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    let mut task_ids = Vec::new();
    for name in ["first", "second"] {
        let res = spec.spawn_task(&session_id, name, "1", "1").await;
        assert_eq!(res.status_code().as_u16(), 200);
        task_ids.push(
            res.json::<serde_json::Value>()["task_id"]
                .as_str()
                .unwrap()
                .to_string(),
        );
    }

    let res = spec
        .server
        .get("/session/remove")
        .add_query_param("username", USER)
        .add_query_param("password", PASSWORD)
        .add_query_param("session_id", &session_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(
        res.json::<serde_json::Value>()["session_id"],
        session_id.as_str()
    );

    // A new login mints a fresh session with no tasks.
    let fresh = spec.login().await;
    assert_ne!(fresh, session_id);
    let res = spec.task_list(&fresh).await;
    assert_eq!(res.json::<serde_json::Value>(), serde_json::json!([]));

    // The old session no longer authenticates, and the old tasks are gone
    // even through the fresh session.
    let res = spec.task_list(&session_id).await;
    assert_eq!(res.status_code().as_u16(), 401);
    for task_id in &task_ids {
        let res = spec.stat(&fresh, task_id).await;
        assert_eq!(res.status_code().as_u16(), 401);
    }
    assert!(spec.store.list_tasks().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn session_remove_of_unknown_session_is_not_found() {
    let spec = spec_with_script(RENDER_OK).await;

    let res = spec
        .server
        .get("/session/remove")
        .add_query_param("username", USER)
        .add_query_param("password", PASSWORD)
        .add_query_param("session_id", "deadbeef")
        .await;
    assert_eq!(res.status_code().as_u16(), 404);
    assert_eq!(res.text(), "Session does not exist");
}

#[tokio::test(flavor = "multi_thread")]
async fn session_remove_requires_credentials() {
    let spec = spec_with_script(RENDER_OK).await;
    let session_id = spec.login().await;

    let res = spec
        .server
        .get("/session/remove")
        .add_query_param("username", USER)
        .add_query_param("password", "wrong")
        .add_query_param("session_id", &session_id)
        .await;
    assert_eq!(res.status_code().as_u16(), 401);

    // The session survives the failed attempt.
    let res = spec.task_list(&session_id).await;
    assert_eq!(res.status_code().as_u16(), 200);
}
