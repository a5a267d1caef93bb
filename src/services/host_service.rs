//! Host-facing controls: status transitions, card advancement with its
//! score side effects, and team/leader assignment.
//!
//! Advancement is the one operation multiple independent clients race on.
//! The compare-and-swap index check, score application, outcome recording,
//! and per-player response reset all happen under the session's write lock,
//! so exactly one of any number of concurrent callers performs the
//! transition and the rest observe a benign no-op.

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        common::{Actor, ActorRole},
        host::{AdvanceOutcome, AdvanceRequest, AssignTeamRequest, ChangeStatusRequest, StatusAction},
        session::SessionSnapshot,
    },
    error::ServiceError,
    services::require_session,
    state::{
        SharedState,
        session::{CardOutcome, EffectDeltas, Session},
        state_machine::{SessionEvent, SessionStatus, TransitionError},
    },
};

fn ensure_host(actor: &Actor) -> Result<(), ServiceError> {
    if actor.role != ActorRole::Host {
        return Err(ServiceError::Unauthorized(
            "operation is restricted to the session host".into(),
        ));
    }
    Ok(())
}

fn ensure_participant(session: &Session, actor: &Actor) -> Result<(), ServiceError> {
    match actor.role {
        ActorRole::Host => Ok(()),
        ActorRole::Player => {
            let id = actor.player_id.ok_or_else(|| {
                ServiceError::InvalidInput("player actor requires a player id".into())
            })?;
            if session.players.contains_key(&id) {
                Ok(())
            } else {
                Err(ServiceError::Unauthorized(format!(
                    "player `{id}` is not in the roster"
                )))
            }
        }
    }
}

/// Apply a host-requested status transition (start / pause / resume / stop).
pub async fn change_status(
    state: &SharedState,
    session_id: Uuid,
    request: ChangeStatusRequest,
) -> Result<SessionSnapshot, ServiceError> {
    ensure_host(&request.actor)?;

    let handle = require_session(state, session_id)?;
    let mut session = handle.write().await;

    let event = match request.action {
        StatusAction::Start => {
            validate_start_roster(&session)?;
            SessionEvent::Start
        }
        StatusAction::Pause => SessionEvent::Pause,
        StatusAction::Resume => SessionEvent::Resume,
        StatusAction::Stop => SessionEvent::Stop,
    };

    let status = session.machine.apply(event, OffsetDateTime::now_utc())?;
    info!(%session_id, action = ?request.action, ?status, "session status changed");

    Ok(SessionSnapshot::from(&*session))
}

/// Request a card advancement on behalf of any participant.
///
/// A stale `observed_index` is reported as `applied: false` with the
/// authoritative index; the caller reconciles on its next poll instead of
/// retrying.
pub async fn advance_card(
    state: &SharedState,
    session_id: Uuid,
    request: AdvanceRequest,
) -> Result<AdvanceOutcome, ServiceError> {
    let handle = require_session(state, session_id)?;
    let mut session = handle.write().await;
    ensure_participant(&session, &request.actor)?;

    let card_index = session.machine.current_card_index();
    let bindings = session.binding_choices();
    // Resolve deltas before the transition; the index moves underneath us.
    let effects: Vec<(Uuid, EffectDeltas)> = session
        .cards
        .get(card_index)
        .map(|card| {
            bindings
                .iter()
                .filter_map(|(team_id, response_id)| {
                    card.response(*response_id).map(|r| (*team_id, r.effects))
                })
                .collect()
        })
        .unwrap_or_default();

    let event = SessionEvent::Advance {
        observed_index: request.observed_index,
    };
    let status = match session.machine.apply(event, OffsetDateTime::now_utc()) {
        Ok(status) => status,
        Err(TransitionError::Stale { actual, .. }) => {
            debug!(%session_id, observed = request.observed_index, actual, "stale advance ignored");
            return Ok(AdvanceOutcome {
                applied: false,
                current_card_index: actual,
                status: session.machine.status(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    for (team_id, deltas) in &effects {
        if let Some(team) = session.teams.get_mut(team_id) {
            team.apply_effects(deltas);
        }
    }
    session.outcomes.push(CardOutcome {
        card_index,
        bindings,
    });
    session.reset_card_responses();

    info!(
        %session_id,
        from = card_index,
        to = session.machine.current_card_index(),
        ?status,
        "card advanced"
    );

    Ok(AdvanceOutcome {
        applied: true,
        current_card_index: session.machine.current_card_index(),
        status,
    })
}

/// Assign a player to a team, optionally promoting them to leader.
pub async fn assign_team(
    state: &SharedState,
    session_id: Uuid,
    player_id: Uuid,
    request: AssignTeamRequest,
) -> Result<SessionSnapshot, ServiceError> {
    ensure_host(&request.actor)?;

    let handle = require_session(state, session_id)?;
    let mut session = handle.write().await;

    if session.machine.status() == SessionStatus::Completed {
        return Err(ServiceError::InvalidState(
            "cannot reassign players in a completed session".into(),
        ));
    }
    if !session.teams.contains_key(&request.team_id) {
        return Err(ServiceError::NotFound(format!(
            "team `{}` not found",
            request.team_id
        )));
    }
    if !session.players.contains_key(&player_id) {
        return Err(ServiceError::NotFound(format!(
            "player `{player_id}` is not in the roster"
        )));
    }

    if request.make_leader {
        for player in session.players.values_mut() {
            if player.team_id == Some(request.team_id) {
                player.is_leader = false;
            }
        }
    }

    let player = session
        .players
        .get_mut(&player_id)
        .expect("player presence checked above");
    player.team_id = Some(request.team_id);
    player.is_leader = request.make_leader;

    info!(
        %session_id,
        %player_id,
        team_id = %request.team_id,
        leader = request.make_leader,
        "player assigned to team"
    );

    Ok(SessionSnapshot::from(&*session))
}

fn validate_start_roster(session: &Session) -> Result<(), ServiceError> {
    for (team_id, team) in &session.teams {
        if session.team_members(*team_id).next().is_none() {
            return Err(ServiceError::InvalidState(format!(
                "team `{}` has no assigned players",
                team.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::session::JoinSessionRequest,
        services::session_service::{self, tests::create_request},
        state::AppState,
    };

    async fn started_session(
        state: &SharedState,
        cards: usize,
        teams: &[&str],
    ) -> (Uuid, Vec<Uuid>, Vec<Uuid>) {
        let snapshot = session_service::create_session(state, create_request(cards, teams))
            .await
            .unwrap();
        let team_ids: Vec<Uuid> = snapshot.teams.iter().map(|t| t.id).collect();

        let mut leader_ids = Vec::new();
        for (i, team_id) in team_ids.iter().enumerate() {
            let joined = session_service::join_session(
                state,
                JoinSessionRequest {
                    join_code: snapshot.join_code.clone(),
                    nickname: format!("leader{i}"),
                },
            )
            .await
            .unwrap();
            assign_team(
                state,
                snapshot.id,
                joined.player.id,
                AssignTeamRequest {
                    team_id: *team_id,
                    make_leader: true,
                    actor: Actor::host(),
                },
            )
            .await
            .unwrap();
            leader_ids.push(joined.player.id);
        }

        change_status(
            state,
            snapshot.id,
            ChangeStatusRequest {
                action: StatusAction::Start,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();

        (snapshot.id, team_ids, leader_ids)
    }

    #[tokio::test]
    async fn start_requires_every_team_to_be_populated() {
        let state = AppState::new(AppConfig::default());
        let snapshot =
            session_service::create_session(&state, create_request(1, &["Blue", "Red"]))
                .await
                .unwrap();

        let err = change_status(
            &state,
            snapshot.id,
            ChangeStatusRequest {
                action: StatusAction::Start,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn status_mutations_are_host_only() {
        let state = AppState::new(AppConfig::default());
        let snapshot = session_service::create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();

        let err = change_status(
            &state,
            snapshot.id,
            ChangeStatusRequest {
                action: StatusAction::Start,
                actor: Actor::player(Uuid::new_v4()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn stale_advance_is_a_benign_no_op() {
        let state = AppState::new(AppConfig::default());
        let (session_id, _, _) = started_session(&state, 3, &["Blue"]).await;

        let first = advance_card(
            &state,
            session_id,
            AdvanceRequest {
                observed_index: 0,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();
        assert!(first.applied);
        assert_eq!(first.current_card_index, 1);

        let second = advance_card(
            &state,
            session_id,
            AdvanceRequest {
                observed_index: 0,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();
        assert!(!second.applied);
        assert_eq!(second.current_card_index, 1);
    }

    #[tokio::test]
    async fn concurrent_advances_apply_exactly_once() {
        let state = AppState::new(AppConfig::default());
        let (session_id, _, _) = started_session(&state, 10, &["Blue"]).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                advance_card(
                    &state,
                    session_id,
                    AdvanceRequest {
                        observed_index: 0,
                        actor: Actor::host(),
                    },
                )
                .await
                .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.current_card_index, 1);
            if outcome.applied {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);

        let snapshot = session_service::snapshot(&state, session_id).await.unwrap();
        assert_eq!(snapshot.current_card_index, 1);
    }

    #[tokio::test]
    async fn advance_applies_binding_effects_and_records_outcome() {
        let state = AppState::new(AppConfig::default());
        let (session_id, team_ids, leader_ids) = started_session(&state, 2, &["Blue"]).await;

        let snapshot = session_service::snapshot(&state, session_id).await.unwrap();
        let response = snapshot.cards[0].responses[0].clone();
        crate::services::decision_service::submit_response(
            &state,
            session_id,
            crate::dto::player::SubmitResponseRequest {
                player_id: leader_ids[0],
                response_id: response.id,
            },
        )
        .await
        .unwrap();

        let outcome = advance_card(
            &state,
            session_id,
            AdvanceRequest {
                observed_index: 0,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();
        assert!(outcome.applied);

        let snapshot = session_service::snapshot(&state, session_id).await.unwrap();
        let team = snapshot.team(team_ids[0]).unwrap();
        assert_eq!(team.score, response.score_delta);
        assert_eq!(team.budget, 100 + response.budget_delta);
        // submission state was reset for the new card
        assert!(snapshot.players.iter().all(|p| !p.has_responded));

        let handle = state.session(session_id).unwrap();
        let session = handle.read().await;
        assert_eq!(session.outcomes.len(), 1);
        assert_eq!(session.outcomes[0].card_index, 0);
        assert_eq!(session.outcomes[0].bindings.get(&team_ids[0]), Some(&response.id));
    }

    #[tokio::test]
    async fn advancing_past_the_last_card_completes_the_session() {
        let state = AppState::new(AppConfig::default());
        let (session_id, _, _) = started_session(&state, 1, &["Blue"]).await;

        let outcome = advance_card(
            &state,
            session_id,
            AdvanceRequest {
                observed_index: 0,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.status, SessionStatus::Completed);

        let results = session_service::results(&state, session_id).await.unwrap();
        assert_eq!(results.standings.len(), 1);
    }
}
