//! Login behavior: session issuance, credential rejection, timing floor.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn login_then_list_empty() {
    let spec = spec_with_script(RENDER_OK).await;

    let session_id = spec.login().await;
    assert_eq!(session_id.len(), 32);
    assert!(session_id.chars().all(|c| c.is_ascii_hexdigit()));

    let res = spec.task_list(&session_id).await;
    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(res.json::<serde_json::Value>(), serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_logins_return_the_same_session() {
    let spec = spec_with_script(RENDER_OK).await;

    let first = spec.login().await;
    let second = spec.login().await;
    let third = spec.login().await;
    assert_eq!(first, second);
    assert_eq!(first, third);
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_credentials_are_rejected_and_paced() {
    let spec = spec_with_script(RENDER_OK).await;

    let start = tokio::time::Instant::now();
    let res = spec.login_as(USER, "wrong").await;
    assert_eq!(res.status_code().as_u16(), 401);
    assert_eq!(res.text(), "Unauthorized");
    // The verification budget is a floor for every outcome.
    assert!(start.elapsed() >= TEST_VERIFY_BUDGET);

    let start = tokio::time::Instant::now();
    let res = spec.login_as("nobody", PASSWORD).await;
    assert_eq!(res.status_code().as_u16(), 401);
    assert!(start.elapsed() >= TEST_VERIFY_BUDGET);

    // No session was created for either attempt.
    assert!(spec
        .store
        .get_sessions_by_username(USER)
        .await
        .unwrap()
        .is_empty());
    assert!(spec
        .store
        .get_sessions_by_username("nobody")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn task_endpoints_reject_unknown_sessions() {
    let spec = spec_with_script(RENDER_OK).await;

    let res = spec.task_list("deadbeef").await;
    assert_eq!(res.status_code().as_u16(), 401);

    let res = spec.stat("deadbeef", "cafebabe").await;
    assert_eq!(res.status_code().as_u16(), 401);

    let res = spec.spawn_task("deadbeef", "cube", "1", "1").await;
    assert_eq!(res.status_code().as_u16(), 401);
}
