//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for tutoring
//! sessions. It uses `utoipa` doc comments to generate OpenAPI documentation.
//! Real business logic lives in `engine`; handlers only extract identity,
//! deserialize payloads, and map `EngineError` to status codes.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    engine::EngineError,
    models::{
        EndSessionPayload, ErrorResponse, Identity, ListSessionsQuery, MessageResponse,
        ReviewPayload, SendMessagePayload, SessionDetail, SessionListItem, SessionRecord,
        SessionSummary, StartSessionPayload, StartSessionResponse, UserRole,
    },
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::BadRequest(msg),
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::Forbidden(msg) => ApiError::Forbidden(msg),
            EngineError::SessionNotActive => {
                ApiError::Conflict("session is not active".to_string())
            }
            EngineError::ReviewAlreadySet => {
                ApiError::Conflict("teacher review already recorded".to_string())
            }
            EngineError::Internal(err) => ApiError::InternalServerError(err),
        }
    }
}

/// Extracts the caller identity from the `x-user-id` / `x-user-role` headers
/// set by the upstream auth middleware. A missing role defaults to student.
fn identity(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))?;

    let role = match headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
        None => UserRole::Student,
        Some(raw) => UserRole::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown role '{}'", raw)))?,
    };

    Ok(Identity {
        user_id: user_id.to_string(),
        role,
    })
}

/// Start a new tutoring session for a module.
#[utoipa::path(
    post,
    path = "/sessions/start",
    request_body = StartSessionPayload,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 403, description = "Module not accessible", body = ErrorResponse),
        (status = 404, description = "Module not found or inactive", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the caller"),
        ("x-user-role" = Option<String>, Header, description = "student (default), teacher or admin")
    )
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<StartSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let response = state.engine.start_session(&identity, payload, false).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Start a teacher test session for a module, bypassing the subscription gate.
#[utoipa::path(
    post,
    path = "/sessions/start-test",
    request_body = StartSessionPayload,
    responses(
        (status = 201, description = "Test session started", body = StartSessionResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 403, description = "Caller may not test this module", body = ErrorResponse),
        (status = 404, description = "Module not found or inactive", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the caller"),
        ("x-user-role" = Option<String>, Header, description = "Must be teacher or admin")
    )
)]
pub async fn start_test_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<StartSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let response = state.engine.start_session(&identity, payload, true).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Send a student message into an active session.
#[utoipa::path(
    post,
    path = "/sessions/message",
    request_body = SendMessagePayload,
    responses(
        (status = 200, description = "Tutor response", body = MessageResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session is not active", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the caller")
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let response = state.engine.handle_message(&identity, payload).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// End a session and archive it. Idempotent.
#[utoipa::path(
    post,
    path = "/sessions/end",
    request_body = EndSessionPayload,
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the caller")
    )
)]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<EndSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let summary = state.engine.end_session(&identity, payload).await?;
    Ok((StatusCode::OK, Json(summary)))
}

/// List the caller's sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(
        ListSessionsQuery,
        ("x-user-id" = String, Header, description = "The ID of the caller")
    ),
    responses(
        (status = 200, description = "List of sessions", body = [SessionListItem]),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let items = state
        .engine
        .list_sessions(
            &identity,
            query.module_id.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(20),
        )
        .await?;
    Ok((StatusCode::OK, Json(items)))
}

/// Get a session with its full message log.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionDetail),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the caller")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let detail = state.engine.get_session(&identity, id).await?;
    Ok((StatusCode::OK, Json(detail)))
}

/// Record the teacher review on an archived session. Settable once.
#[utoipa::path(
    post,
    path = "/sessions/{id}/review",
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Reviewed record", body = SessionRecord),
        (status = 403, description = "Caller is not a teacher", body = ErrorResponse),
        (status = 404, description = "Archived session not found", body = ErrorResponse),
        (status = 409, description = "Review already recorded", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the caller"),
        ("x-user-role" = Option<String>, Header, description = "Must be teacher or admin")
    )
)]
pub async fn review_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = identity(&headers)?;
    let record = state
        .engine
        .review_session(&identity, id, &payload.notes)
        .await?;
    Ok((StatusCode::OK, Json(record)))
}
