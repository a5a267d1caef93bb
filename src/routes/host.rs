use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::{
        host::{AdvanceOutcome, AdvanceRequest, AssignTeamRequest, ChangeStatusRequest},
        session::SessionSnapshot,
    },
    error::AppError,
    services::host_service,
    state::SharedState,
};

/// Routes for host controls and card advancement.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/status", post(change_status))
        .route("/sessions/{id}/advance", post(advance_card))
        .route("/sessions/{id}/players/{player_id}/team", post(assign_team))
}

/// Apply a start / pause / resume / stop transition. Host-only.
#[utoipa::path(
    post,
    path = "/sessions/{id}/status",
    tag = "host",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SessionSnapshot),
        (status = 401, description = "Actor is not the host"),
        (status = 409, description = "Transition not valid from the current status")
    )
)]
pub async fn change_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = host_service::change_status(&state, id, payload).await?;
    Ok(Json(snapshot))
}

/// Request a card advancement conditioned on the caller's last-observed
/// index. A stale precondition yields `applied: false`, not an error.
#[utoipa::path(
    post,
    path = "/sessions/{id}/advance",
    tag = "host",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Advancement outcome", body = AdvanceOutcome),
        (status = 409, description = "Session is not in progress")
    )
)]
pub async fn advance_card(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<AdvanceOutcome>, AppError> {
    let outcome = host_service::advance_card(&state, id, payload).await?;
    Ok(Json(outcome))
}

/// Assign a player to a team, optionally promoting them to leader. Host-only.
#[utoipa::path(
    post,
    path = "/sessions/{id}/players/{player_id}/team",
    tag = "host",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("player_id" = Uuid, Path, description = "Player to assign")
    ),
    request_body = AssignTeamRequest,
    responses(
        (status = 200, description = "Player assigned", body = SessionSnapshot),
        (status = 401, description = "Actor is not the host"),
        (status = 404, description = "Unknown session, team, or player")
    )
)]
pub async fn assign_team(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AssignTeamRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = host_service::assign_team(&state, id, player_id, payload).await?;
    Ok(Json(snapshot))
}
