//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        EndSessionPayload, ErrorResponse, ExerciseAnswer, MessageResponse, RecordState,
        ReviewPayload, SendMessagePayload, SessionContext, SessionDetail, SessionListItem,
        SessionRecord, SessionStats, SessionStatus, SessionSummary, StartSessionPayload,
        StartSessionResponse, StoredMessage, TutorSession, UserRole,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::start_session,
        handlers::start_test_session,
        handlers::send_message,
        handlers::end_session,
        handlers::list_sessions,
        handlers::get_session,
        handlers::review_session,
    ),
    components(
        schemas(
            StartSessionPayload,
            StartSessionResponse,
            SendMessagePayload,
            ExerciseAnswer,
            MessageResponse,
            SessionStats,
            EndSessionPayload,
            SessionSummary,
            ReviewPayload,
            TutorSession,
            SessionContext,
            SessionStatus,
            StoredMessage,
            SessionListItem,
            SessionDetail,
            SessionRecord,
            RecordState,
            UserRole,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Lingua API", description = "Session management for the language tutoring engine")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/start-test", post(handlers::start_test_session))
        .route("/sessions/message", post(handlers::send_message))
        .route("/sessions/end", post(handlers::end_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/review", post(handlers::review_session))
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
