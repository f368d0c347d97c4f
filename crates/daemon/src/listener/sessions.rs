// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session handlers: login, list, remove.
//!
//! These three endpoints authenticate with username and password rather
//! than a session id, so each one pays the fixed verification budget.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use glacier_core::{SessionId, SessionRecord};

use super::{ApiError, ServerCtx};

#[derive(Deserialize)]
pub(super) struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub(super) struct RemoveParams {
    username: String,
    password: String,
    session_id: String,
}

#[derive(Serialize)]
pub(super) struct SessionIdResponse {
    session_id: SessionId,
}

#[derive(Serialize)]
pub(super) struct SessionListResponse {
    sessions: Vec<SessionRecord>,
}

/// `GET /login` — verify credentials, return the user's session, minting
/// one if none exists.
pub(super) async fn login(
    State(ctx): State<Arc<ServerCtx>>,
    Query(creds): Query<Credentials>,
) -> Result<Json<SessionIdResponse>, ApiError> {
    match ctx.auth.login(&creds.username, &creds.password).await? {
        Some(session_id) => Ok(Json(SessionIdResponse { session_id })),
        None => Err(ApiError::Unauthorized),
    }
}

/// `GET /session/list` — every session belonging to the caller.
pub(super) async fn list(
    State(ctx): State<Arc<ServerCtx>>,
    Query(creds): Query<Credentials>,
) -> Result<Json<SessionListResponse>, ApiError> {
    if !ctx
        .auth
        .verify_password(&creds.username, &creds.password)
        .await?
    {
        return Err(ApiError::Unauthorized);
    }
    let sessions = ctx
        .auth
        .store()
        .get_sessions_by_username(&creds.username)
        .await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// `GET /session/remove` — delete the caller's session, cascading to its
/// tasks. Sessions of other users are reported as unknown.
pub(super) async fn remove(
    State(ctx): State<Arc<ServerCtx>>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<SessionIdResponse>, ApiError> {
    if !ctx
        .auth
        .verify_password(&params.username, &params.password)
        .await?
    {
        return Err(ApiError::Unauthorized);
    }

    let session_id = SessionId::new(params.session_id);
    let session = ctx
        .auth
        .session(&session_id)
        .await?
        .ok_or(ApiError::NotFound("Session does not exist"))?;
    if session.username != params.username {
        return Err(ApiError::NotFound("Session does not exist"));
    }

    ctx.auth.delete_session(&session_id).await?;
    Ok(Json(SessionIdResponse { session_id }))
}
