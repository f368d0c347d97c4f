// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task handlers: request, stat, list, kill, delete, result.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use glacier_core::{SessionId, TaskId, TaskRecord, TaskState};

use super::{require_session, ApiError, ServerCtx};

#[derive(Deserialize)]
pub(super) struct SessionParams {
    session_id: String,
}

#[derive(Deserialize)]
pub(super) struct TaskParams {
    session_id: String,
    task_id: String,
}

#[derive(Deserialize)]
pub(super) struct RequestParams {
    session_id: String,
    task_name: String,
    start_frame: String,
    end_frame: String,
}

#[derive(Serialize)]
pub(super) struct TaskIdResponse {
    task_id: TaskId,
}

/// Task row plus the live progress line, as returned by stat and list.
#[derive(Serialize)]
pub(super) struct TaskEntry {
    task_id: TaskId,
    task_name: String,
    parent_session_id: SessionId,
    username: String,
    blend_file_path: String,
    state: TaskState,
    /// Last non-empty output line of the render child; empty for tasks
    /// with no supervisor (rows surviving from a previous run).
    progress: String,
}

fn task_entry(ctx: &ServerCtx, task: TaskRecord) -> TaskEntry {
    let supervisor = ctx.auth.registry().get(task.task_id.as_str());
    let (state, progress) = match &supervisor {
        Some(s) => (s.state(), s.progress()),
        None => (task.state, String::new()),
    };
    TaskEntry {
        task_id: task.task_id,
        task_name: task.task_name,
        parent_session_id: task.parent_session_id,
        username: task.username,
        blend_file_path: task.blend_file_path,
        state,
        progress,
    }
}

/// Frame bounds must be all-digit strings; checked before any side effect.
/// The 403 is reserved for non-digit input; digit strings too large for a
/// frame number get a plain bad request.
fn parse_frames(start: &str, end: &str) -> Result<(u32, u32), ApiError> {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(start) || !all_digits(end) {
        return Err(ApiError::NonDigitFrames);
    }
    match (start.parse(), end.parse()) {
        (Ok(start), Ok(end)) => Ok((start, end)),
        _ => Err(ApiError::BadRequest("Frame out of range")),
    }
}

/// Validate session, task, and ownership. Unknown task ids map to
/// `missing`; a task owned by another session is a plain 401, so foreign
/// ids are indistinguishable from unknown ones.
async fn lookup_owned_task(
    ctx: &ServerCtx,
    params: &TaskParams,
    missing: ApiError,
) -> Result<TaskRecord, ApiError> {
    let session_id = SessionId::new(params.session_id.clone());
    require_session(ctx, &session_id).await?;

    let task = ctx
        .auth
        .store()
        .get_task_by_id(&TaskId::new(params.task_id.clone()))
        .await?
        .ok_or(missing)?;
    if task.parent_session_id != session_id {
        return Err(ApiError::Unauthorized);
    }
    Ok(task)
}

/// `POST /task/request` — accept a scene upload and register the task.
pub(super) async fn request(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<RequestParams>,
    multipart: Multipart,
) -> Result<Json<TaskIdResponse>, ApiError> {
    let session_id = SessionId::new(params.session_id);
    require_session(&ctx, &session_id).await?;
    let (start_frame, end_frame) = parse_frames(&params.start_frame, &params.end_frame)?;
    let blend_bytes = read_file_field(multipart).await?;

    let task_id = ctx
        .auth
        .add_task(
            &params.task_name,
            &session_id,
            &blend_bytes,
            start_frame,
            end_frame,
        )
        .await?;
    Ok(Json(TaskIdResponse { task_id }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Malformed upload"))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|_| ApiError::BadRequest("Malformed upload"));
        }
    }
    Err(ApiError::BadRequest("Missing file field"))
}

/// `GET /task/stat` — task row plus progress.
pub(super) async fn stat(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<TaskParams>,
) -> Result<Json<TaskEntry>, ApiError> {
    let task = lookup_owned_task(&ctx, &params, ApiError::Unauthorized).await?;
    Ok(Json(task_entry(&ctx, task)))
}

/// `GET /task/list` — every task owned by the caller's session.
pub(super) async fn list(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<SessionParams>,
) -> Result<Json<Vec<TaskEntry>>, ApiError> {
    let session_id = SessionId::new(params.session_id);
    require_session(&ctx, &session_id).await?;
    let tasks = ctx
        .auth
        .store()
        .get_tasks_by_session_id(&session_id)
        .await?;
    Ok(Json(
        tasks.into_iter().map(|task| task_entry(&ctx, task)).collect(),
    ))
}

/// `GET /task/kill` — request cancellation; the render worker observes the
/// flag cooperatively. Killing a task without a supervisor is a no-op.
pub(super) async fn kill(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<TaskParams>,
) -> Result<Json<TaskIdResponse>, ApiError> {
    let task = lookup_owned_task(&ctx, &params, ApiError::NotFound("Task does not exist")).await?;
    if let Some(renderer) = ctx.auth.registry().get(task.task_id.as_str()) {
        renderer.kill();
    }
    Ok(Json(TaskIdResponse {
        task_id: task.task_id,
    }))
}

/// `GET /task/delete` — remove the task, its supervisor, and its scratch
/// files.
pub(super) async fn delete(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<TaskParams>,
) -> Result<Json<TaskIdResponse>, ApiError> {
    let task = lookup_owned_task(&ctx, &params, ApiError::NotFound("Task does not exist")).await?;
    ctx.auth.delete_task(&task).await?;
    Ok(Json(TaskIdResponse {
        task_id: task.task_id,
    }))
}

/// `GET /task/result` — stream back the packaged tar and mark the task
/// `DONE`. Only a `PACKED` task has a result.
pub(super) async fn result(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<TaskParams>,
) -> Result<Response, ApiError> {
    let task = lookup_owned_task(&ctx, &params, ApiError::Unauthorized).await?;

    let renderer = ctx
        .auth
        .registry()
        .get(task.task_id.as_str())
        .ok_or(ApiError::BadRequest("Task is not packed"))?;
    if renderer.state() != TaskState::Packed {
        return Err(ApiError::BadRequest("Task is not packed"));
    }
    let tar_path = renderer
        .tar_path()
        .ok_or(ApiError::BadRequest("Task is not packed"))?;

    let bytes = tokio::fs::read(&tar_path).await.map_err(|e| {
        tracing::error!(path = %tar_path.display(), error = %e, "failed to read packaged result");
        ApiError::Internal
    })?;

    renderer.done().await;
    Ok(([(header::CONTENT_TYPE, "application/gzip")], bytes).into_response())
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
