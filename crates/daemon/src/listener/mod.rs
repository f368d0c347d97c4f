// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP listener for the render backend API.
//!
//! Stateless axum handlers over the auth layer. Every handler catches its
//! errors and maps them into the [`ApiError`] taxonomy; render-time
//! failures are never HTTP errors, they surface as terminal task states
//! via `/task/stat`.

mod sessions;
mod tasks;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use glacier_core::{SessionId, SessionRecord};
use glacier_store::StoreError;

use crate::auth::{AuthError, AuthManager};

/// Port the API listens on.
pub const LISTEN_PORT: u16 = 8888;

/// Upload cap for scene files. Scenes are large; the axum default of 2 MB
/// would reject nearly all of them.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared daemon context for all request handlers.
pub struct ServerCtx {
    pub auth: Arc<AuthManager>,
}

/// Build the API router.
pub fn router(ctx: Arc<ServerCtx>) -> Router {
    Router::new()
        .route("/login", get(sessions::login))
        .route("/session/list", get(sessions::list))
        .route("/session/remove", get(sessions::remove))
        .route("/task/request", post(tasks::request))
        .route("/task/stat", get(tasks::stat))
        .route("/task/list", get(tasks::list))
        .route("/task/kill", get(tasks::kill))
        .route("/task/delete", get(tasks::delete))
        .route("/task/result", get(tasks::result))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(ctx)
}

/// Error taxonomy the handlers map into.
///
/// Bodies are short plain-text strings; identifiers echoed back are
/// limited to ones the caller supplied.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown credentials, session, or task. 401.
    Unauthorized,
    /// Lookup miss on an operation that requires the resource. 404.
    NotFound(&'static str),
    /// Request is well-formed but unserviceable. 400.
    BadRequest(&'static str),
    /// Frame bounds are not all-digit strings. 403.
    NonDigitFrames,
    /// Unexpected failure; details stay in the log. 500.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(body) => (StatusCode::NOT_FOUND, body),
            ApiError::BadRequest(body) => (StatusCode::BAD_REQUEST, body),
            ApiError::NonDigitFrames => (StatusCode::FORBIDDEN, "Non-digit frames"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store failure in handler");
        ApiError::Internal
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownSession(_) => ApiError::Unauthorized,
            other => {
                tracing::error!(error = %other, "auth failure in handler");
                ApiError::Internal
            }
        }
    }
}

/// Look up the caller's session or fail with 401.
async fn require_session(
    ctx: &ServerCtx,
    session_id: &SessionId,
) -> Result<SessionRecord, ApiError> {
    ctx.auth
        .session(session_id)
        .await?
        .ok_or(ApiError::Unauthorized)
}
