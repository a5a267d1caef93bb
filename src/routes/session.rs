use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::session::{CreateSessionRequest, JoinSessionRequest, JoinedSession, SessionSnapshot},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes handling session bootstrap, joining, and polling.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/join", post(join_session))
        .route("/sessions/{id}/snapshot", get(get_snapshot))
}

/// Create a fresh session in the waiting state.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = SessionSnapshot)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::create_session(&state, payload).await?;
    Ok(Json(snapshot))
}

/// Join an existing session by code.
#[utoipa::path(
    post,
    path = "/sessions/join",
    tag = "session",
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinedSession),
        (status = 404, description = "Unknown join code")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<Json<JoinedSession>, AppError> {
    let joined = session_service::join_session(&state, payload).await?;
    Ok(Json(joined))
}

/// Polled snapshot of everything a client reconciles against.
#[utoipa::path(
    get,
    path = "/sessions/{id}/snapshot",
    tag = "session",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_snapshot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = session_service::snapshot(&state, id).await?;
    Ok(Json(snapshot))
}
