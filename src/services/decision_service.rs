//! Decision recording and aggregation: per-player submissions (at most one
//! per card), advisory vote tallies, and the leader-consensus predicate that
//! drives auto-advancement.

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::{
        player::{LeadersResponded, SubmitResponseRequest, VoteCount, VoteTally},
        session::PlayerSummary,
    },
    error::ServiceError,
    services::require_session,
    state::{SharedState, state_machine::SessionStatus},
};

/// Record a player's response for the current card.
///
/// A submission is immutable: a second attempt for the same card is rejected
/// with a conflict and the stored selection is left untouched, so concurrent
/// duplicates from retries cannot overwrite the original.
pub async fn submit_response(
    state: &SharedState,
    session_id: Uuid,
    request: SubmitResponseRequest,
) -> Result<PlayerSummary, ServiceError> {
    let handle = require_session(state, session_id)?;
    let mut session = handle.write().await;

    if session.machine.status() != SessionStatus::InProgress {
        return Err(ServiceError::InvalidState(
            "responses are only accepted while the session is in progress".into(),
        ));
    }

    let (card_index, card) = session
        .current_card()
        .ok_or_else(|| ServiceError::InvalidState("no active card".into()))?;
    if card.response(request.response_id).is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "response `{}` does not belong to the current card",
            request.response_id
        )));
    }

    let player = session
        .players
        .get_mut(&request.player_id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("player `{}` is not in the roster", request.player_id))
        })?;
    if player.team_id.is_none() {
        return Err(ServiceError::InvalidState(
            "player is not assigned to a team".into(),
        ));
    }
    if player.response_id.is_some() {
        return Err(ServiceError::Conflict(
            "a response is already recorded for this card".into(),
        ));
    }

    player.response_id = Some(request.response_id);
    player.has_responded = true;
    let summary = PlayerSummary::from(&*player);
    debug!(
        %session_id,
        player_id = %request.player_id,
        response_id = %request.response_id,
        card_index,
        leader = summary.is_leader,
        "response recorded"
    );

    Ok(summary)
}

/// Advisory vote tally for one team on the current card. Leader-only.
pub async fn vote_tally(
    state: &SharedState,
    session_id: Uuid,
    team_id: Uuid,
    requester: Uuid,
) -> Result<VoteTally, ServiceError> {
    let handle = require_session(state, session_id)?;
    let session = handle.read().await;

    if !session.teams.contains_key(&team_id) {
        return Err(ServiceError::NotFound(format!("team `{team_id}` not found")));
    }
    match session.leader_of(team_id) {
        Some(leader) if leader.id == requester => {}
        _ => {
            return Err(ServiceError::Unauthorized(
                "vote tallies are visible to the team leader only".into(),
            ));
        }
    }

    let (card_index, card) = session
        .current_card()
        .ok_or_else(|| ServiceError::InvalidState("no active card".into()))?;

    let votes = session
        .vote_tally(team_id)
        .into_iter()
        .map(|(response_id, count)| VoteCount { response_id, count })
        .collect();

    Ok(VoteTally {
        team_id,
        card_id: card.id,
        card_index,
        votes,
    })
}

/// Whether every populated team's leader has a recorded response for the
/// current card. Clients poll this to decide when to request advancement.
pub async fn leaders_responded(
    state: &SharedState,
    session_id: Uuid,
) -> Result<LeadersResponded, ServiceError> {
    let handle = require_session(state, session_id)?;
    let session = handle.read().await;

    Ok(LeadersResponded {
        all_responded: session.all_leaders_responded(),
        current_card_index: session.machine.current_card_index(),
    })
}
