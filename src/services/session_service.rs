//! Session lifecycle operations: bootstrap, join, snapshots, reconnection
//! validation, leave notifications, and final results.

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        player::{
            BindingSummary, CardOutcomeSummary, FinalOutcome, SessionResults, TeamStanding,
        },
        session::{
            CreateSessionRequest, JoinSessionRequest, JoinedSession, PlayerSummary,
            SessionSnapshot,
        },
    },
    dto::validation::{JOIN_CODE_CHARSET, JOIN_CODE_LENGTH},
    error::ServiceError,
    services::require_session,
    state::{
        SharedState,
        session::{Card, EffectDeltas, Player, Response, Session, Team, TeamColor},
        state_machine::SessionStatus,
    },
};

const MAX_JOIN_CODE_ATTEMPTS: usize = 32;

/// Bootstrap a fresh session in the waiting state.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionSnapshot, ServiceError> {
    request.validate()?;

    if request.name.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "session name must not be empty".into(),
        ));
    }

    let teams = build_teams(state, &request)?;
    let cards = build_cards(&request)?;
    let join_code = generate_join_code(state)?;

    let session = Session::new(request.name, join_code, cards, teams);
    let snapshot = SessionSnapshot::from(&session);
    info!(session_id = %session.id, join_code = %session.join_code, "session created");
    state.insert_session(session);

    Ok(snapshot)
}

/// Join a session by code, creating a roster entry.
pub async fn join_session(
    state: &SharedState,
    request: JoinSessionRequest,
) -> Result<JoinedSession, ServiceError> {
    request.validate()?;

    let handle = state.session_by_code(&request.join_code).ok_or_else(|| {
        ServiceError::NotFound(format!("no session with join code `{}`", request.join_code))
    })?;

    let mut session = handle.write().await;
    if session.machine.status() == SessionStatus::Completed {
        return Err(ServiceError::InvalidState(
            "session is already completed".into(),
        ));
    }

    let nickname = request.nickname.trim().to_owned();
    if session
        .players
        .values()
        .any(|p| p.nickname.eq_ignore_ascii_case(&nickname))
    {
        return Err(ServiceError::Conflict(format!(
            "nickname `{nickname}` is already taken"
        )));
    }

    let player = Player {
        id: Uuid::new_v4(),
        nickname,
        team_id: None,
        is_leader: false,
        is_connected: true,
        has_responded: false,
        response_id: None,
    };
    let summary = PlayerSummary::from(&player);
    session.players.insert(player.id, player);
    info!(session_id = %session.id, player_id = %summary.id, "player joined");

    Ok(JoinedSession {
        session_id: session.id,
        player: summary,
        snapshot: SessionSnapshot::from(&*session),
    })
}

/// Polled snapshot of one session.
pub async fn snapshot(state: &SharedState, id: Uuid) -> Result<SessionSnapshot, ServiceError> {
    let handle = require_session(state, id)?;
    let session = handle.read().await;
    Ok(SessionSnapshot::from(&*session))
}

/// Confirm a player id still exists in the session roster, returning the
/// authoritative roster entry. Reconnecting clients re-derive role and team
/// from this, never from a cached copy.
pub async fn validate_player(
    state: &SharedState,
    session_id: Uuid,
    player_id: Uuid,
) -> Result<PlayerSummary, ServiceError> {
    let handle = require_session(state, session_id)?;
    let session = handle.read().await;
    session
        .players
        .get(&player_id)
        .map(PlayerSummary::from)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("player `{player_id}` is not in the roster"))
        })
}

/// Best-effort leave notification. Marks the player disconnected; unknown
/// sessions or players are ignored so clients can fire this on shutdown
/// without caring about the response.
pub async fn leave_session(state: &SharedState, session_id: Uuid, player_id: Uuid) {
    let Some(handle) = state.session(session_id) else {
        return;
    };
    let mut session = handle.write().await;
    if let Some(player) = session.players.get_mut(&player_id) {
        player.is_connected = false;
        debug!(%session_id, %player_id, "player marked disconnected");
    }
}

/// Final results. Only available once the session is completed.
pub async fn results(state: &SharedState, id: Uuid) -> Result<SessionResults, ServiceError> {
    let handle = require_session(state, id)?;
    let session = handle.read().await;

    if session.machine.status() != SessionStatus::Completed {
        return Err(ServiceError::InvalidState(
            "results are only available once the session is completed".into(),
        ));
    }

    let mut ranked: Vec<&Team> = session.teams.values().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let standings = ranked
        .iter()
        .map(|team| TeamStanding {
            rank: 1 + ranked.iter().filter(|t| t.score > team.score).count(),
            team: (*team).into(),
        })
        .collect::<Vec<_>>();

    let top_score = ranked.first().map(|t| t.score);
    let leaders: Vec<Uuid> = ranked
        .iter()
        .filter(|t| Some(t.score) == top_score)
        .map(|t| t.id)
        .collect();
    let outcome = match leaders.as_slice() {
        [single] => FinalOutcome::Winner { team_id: *single },
        _ => FinalOutcome::Tie { team_ids: leaders },
    };

    let history = session
        .outcomes
        .iter()
        .map(|outcome| CardOutcomeSummary {
            card_index: outcome.card_index,
            bindings: outcome
                .bindings
                .iter()
                .map(|(team_id, response_id)| BindingSummary {
                    team_id: *team_id,
                    response_id: *response_id,
                })
                .collect(),
        })
        .collect();

    Ok(SessionResults {
        session_id: session.id,
        standings,
        outcome,
        history,
    })
}

fn build_teams(
    state: &SharedState,
    request: &CreateSessionRequest,
) -> Result<Vec<Team>, ServiceError> {
    let mut teams = Vec::with_capacity(request.teams.len());
    let mut used_colors: Vec<TeamColor> = Vec::new();

    for input in &request.teams {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput(
                "team name must not be empty".into(),
            ));
        }
        if teams
            .iter()
            .any(|t: &Team| t.name.eq_ignore_ascii_case(name))
        {
            return Err(ServiceError::InvalidInput(format!(
                "duplicate team name `{name}` detected"
            )));
        }

        let color = input
            .color
            .map(Into::into)
            .unwrap_or_else(|| state.config().first_unused_color(&used_colors));
        used_colors.push(color);

        teams.push(Team {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            color,
            score: 0,
            budget: input.starting_budget.unwrap_or(0),
        });
    }

    Ok(teams)
}

fn build_cards(request: &CreateSessionRequest) -> Result<Vec<Card>, ServiceError> {
    request
        .cards
        .iter()
        .map(|card| {
            if card.title.trim().is_empty() {
                return Err(ServiceError::InvalidInput(
                    "card title must not be empty".into(),
                ));
            }

            let responses = card
                .responses
                .iter()
                .map(|response| {
                    if response.text.trim().is_empty() {
                        return Err(ServiceError::InvalidInput(
                            "response text must not be empty".into(),
                        ));
                    }
                    Ok(Response {
                        id: Uuid::new_v4(),
                        text: response.text.clone(),
                        effects: EffectDeltas {
                            score: response.score_delta,
                            budget: response.budget_delta,
                        },
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Card {
                id: Uuid::new_v4(),
                title: card.title.clone(),
                description: card.description.clone(),
                time_limit_minutes: card.time_limit_minutes,
                responses,
            })
        })
        .collect()
}

fn generate_join_code(state: &SharedState) -> Result<String, ServiceError> {
    let mut rng = rand::rng();
    for _ in 0..MAX_JOIN_CODE_ATTEMPTS {
        let code: String = (0..JOIN_CODE_LENGTH)
            .map(|_| JOIN_CODE_CHARSET[rng.random_range(0..JOIN_CODE_CHARSET.len())] as char)
            .collect();
        if !state.join_code_in_use(&code) {
            return Ok(code);
        }
    }

    Err(ServiceError::InvalidState(
        "could not allocate a unique join code".into(),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::session::{CardInput, ResponseInput, TeamInput},
        dto::validation::validate_join_code,
        state::AppState,
    };

    pub(crate) fn deck(cards: usize) -> Vec<CardInput> {
        (0..cards)
            .map(|i| CardInput {
                title: format!("card {i}"),
                description: "scenario".into(),
                time_limit_minutes: 5,
                responses: vec![
                    ResponseInput {
                        text: "contain".into(),
                        score_delta: 10,
                        budget_delta: -5,
                    },
                    ResponseInput {
                        text: "escalate".into(),
                        score_delta: -5,
                        budget_delta: 0,
                    },
                ],
            })
            .collect()
    }

    pub(crate) fn create_request(cards: usize, teams: &[&str]) -> CreateSessionRequest {
        CreateSessionRequest {
            name: "drill".into(),
            teams: teams
                .iter()
                .map(|name| TeamInput {
                    name: (*name).into(),
                    color: None,
                    starting_budget: Some(100),
                })
                .collect(),
            cards: deck(cards),
        }
    }

    #[tokio::test]
    async fn create_allocates_join_code_and_colors() {
        let state = AppState::new(AppConfig::default());
        let snapshot = create_session(&state, create_request(2, &["Blue", "Red"]))
            .await
            .unwrap();

        assert!(validate_join_code(&snapshot.join_code).is_ok());
        assert_eq!(snapshot.total_cards, 2);
        assert_ne!(snapshot.teams[0].color, snapshot.teams[1].color);
        assert_eq!(snapshot.status, SessionStatus::Waiting);
    }

    #[tokio::test]
    async fn create_rejects_empty_deck() {
        let state = AppState::new(AppConfig::default());
        let err = create_session(&state, create_request(0, &["Blue"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn join_rejects_duplicate_nicknames() {
        let state = AppState::new(AppConfig::default());
        let snapshot = create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();

        let join = |nickname: &str| JoinSessionRequest {
            join_code: snapshot.join_code.clone(),
            nickname: nickname.into(),
        };
        join_session(&state, join("ada")).await.unwrap();
        let err = join_session(&state, join("Ada")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn validate_player_distinguishes_known_and_unknown() {
        let state = AppState::new(AppConfig::default());
        let snapshot = create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();
        let joined = join_session(
            &state,
            JoinSessionRequest {
                join_code: snapshot.join_code.clone(),
                nickname: "ada".into(),
            },
        )
        .await
        .unwrap();

        let found = validate_player(&state, snapshot.id, joined.player.id)
            .await
            .unwrap();
        assert_eq!(found.nickname, "ada");

        let err = validate_player(&state, snapshot.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn results_require_completion() {
        let state = AppState::new(AppConfig::default());
        let snapshot = create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();
        let err = results(&state, snapshot.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn tied_top_scores_have_no_single_winner() {
        use crate::dto::{
            common::Actor,
            host::{ChangeStatusRequest, StatusAction},
        };
        use crate::services::host_service;

        let state = AppState::new(AppConfig::default());
        let snapshot = create_session(&state, create_request(3, &["Blue", "Red"]))
            .await
            .unwrap();
        // both teams keep their starting score of zero when the host stops early
        host_service::change_status(
            &state,
            snapshot.id,
            ChangeStatusRequest {
                action: StatusAction::Stop,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();

        let results = results(&state, snapshot.id).await.unwrap();
        match results.outcome {
            FinalOutcome::Tie { team_ids } => assert_eq!(team_ids.len(), 2),
            other => panic!("expected a tie, got {other:?}"),
        }
        assert!(results.standings.iter().all(|s| s.rank == 1));
    }
}
