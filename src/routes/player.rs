use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        player::{
            LeadersResponded, LeaveRequest, SessionResults, SubmitResponseRequest, VoteTally,
            VoteTallyQuery,
        },
        session::PlayerSummary,
    },
    error::AppError,
    services::{decision_service, session_service},
    state::SharedState,
};

/// Routes for player submissions, tallies, reconnection, and results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/responses", post(submit_response))
        .route(
            "/sessions/{id}/teams/{team_id}/votes",
            get(get_vote_tally),
        )
        .route(
            "/sessions/{id}/leaders-responded",
            get(get_leaders_responded),
        )
        .route("/sessions/{id}/players/{player_id}", get(validate_player))
        .route("/sessions/{id}/results", get(get_results))
        .route("/sessions/{id}/leave", post(leave_session))
}

/// Record a player's response for the current card. Duplicate submissions
/// for the same card are rejected with a conflict.
#[utoipa::path(
    post,
    path = "/sessions/{id}/responses",
    tag = "player",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = SubmitResponseRequest,
    responses(
        (status = 200, description = "Response recorded", body = PlayerSummary),
        (status = 409, description = "A response is already recorded for this card")
    )
)]
pub async fn submit_response(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<Json<PlayerSummary>, AppError> {
    let summary = decision_service::submit_response(&state, id, payload).await?;
    Ok(Json(summary))
}

/// Advisory vote tally for one team on the current card. Leader-only.
#[utoipa::path(
    get,
    path = "/sessions/{id}/teams/{team_id}/votes",
    tag = "player",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("team_id" = Uuid, Path, description = "Team the tally belongs to"),
        ("player_id" = Uuid, Query, description = "Requesting player; must be the team leader")
    ),
    responses(
        (status = 200, description = "Current tally", body = VoteTally),
        (status = 401, description = "Requester is not the team leader")
    )
)]
pub async fn get_vote_tally(
    State(state): State<SharedState>,
    Path((id, team_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<VoteTallyQuery>,
) -> Result<Json<VoteTally>, AppError> {
    let tally = decision_service::vote_tally(&state, id, team_id, query.player_id).await?;
    Ok(Json(tally))
}

/// Whether every populated team's leader has responded for the current card.
#[utoipa::path(
    get,
    path = "/sessions/{id}/leaders-responded",
    tag = "player",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Consensus check", body = LeadersResponded))
)]
pub async fn get_leaders_responded(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadersResponded>, AppError> {
    let check = decision_service::leaders_responded(&state, id).await?;
    Ok(Json(check))
}

/// Confirm a player id still exists in the roster; used by reconnecting
/// clients before trusting any cached role.
#[utoipa::path(
    get,
    path = "/sessions/{id}/players/{player_id}",
    tag = "player",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("player_id" = Uuid, Path, description = "Player to validate")
    ),
    responses(
        (status = 200, description = "Player is in the roster", body = PlayerSummary),
        (status = 404, description = "Player is not in the roster")
    )
)]
pub async fn validate_player(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PlayerSummary>, AppError> {
    let summary = session_service::validate_player(&state, id, player_id).await?;
    Ok(Json(summary))
}

/// Final results once the session is completed.
#[utoipa::path(
    get,
    path = "/sessions/{id}/results",
    tag = "player",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Final results", body = SessionResults),
        (status = 409, description = "Session is not completed yet")
    )
)]
pub async fn get_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResults>, AppError> {
    let results = session_service::results(&state, id).await?;
    Ok(Json(results))
}

/// Best-effort leave notification; always succeeds.
#[utoipa::path(
    post,
    path = "/sessions/{id}/leave",
    tag = "player",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = LeaveRequest,
    responses((status = 204, description = "Notification accepted"))
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeaveRequest>,
) -> axum::http::StatusCode {
    session_service::leave_session(&state, id, payload.player_id).await;
    axum::http::StatusCode::NO_CONTENT
}
