use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        common::TeamColorDto,
        validation::{validate_join_code, validate_nickname},
    },
    state::{
        session::{Card, Player, Response, Session, Team},
        state_machine::SessionStatus,
    },
};

/// Payload used to bootstrap a brand-new session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Display name of the scenario.
    pub name: String,
    /// Teams competing in the session.
    #[validate(length(min = 1), nested)]
    pub teams: Vec<TeamInput>,
    /// Ordered deck of decision cards.
    #[validate(length(min = 1), nested)]
    pub cards: Vec<CardInput>,
}

/// Incoming team definition for the session bootstrap.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamInput {
    /// Display name.
    pub name: String,
    /// Optional HSV color. If omitted, the backend picks the first unused
    /// color from the configured presets.
    #[serde(default)]
    pub color: Option<TeamColorDto>,
    /// Starting budget; defaults to zero.
    #[serde(default)]
    pub starting_budget: Option<i32>,
}

impl Validate for TeamInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref color) = self.color
            && let Err(color_errors) = color.validate()
        {
            errors.merge_self("color", Err(color_errors));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Card details supplied when bootstrapping a session.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CardInput {
    /// Short headline.
    pub title: String,
    /// Scenario text.
    pub description: String,
    /// Countdown budget in minutes.
    #[validate(range(min = 1))]
    pub time_limit_minutes: u32,
    /// Selectable responses, in display order.
    #[validate(length(min = 1))]
    pub responses: Vec<ResponseInput>,
}

/// Response option supplied for a card.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseInput {
    /// Display text.
    pub text: String,
    /// Score delta applied when binding.
    #[serde(default)]
    pub score_delta: i32,
    /// Budget delta applied when binding.
    #[serde(default)]
    pub budget_delta: i32,
}

/// Payload used to join an existing session by code.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinSessionRequest {
    /// The session's join code.
    pub join_code: String,
    /// Display name for the new player.
    pub nickname: String,
}

impl Validate for JoinSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_join_code(&self.join_code) {
            errors.add("join_code", e);
        }
        if let Err(e) = validate_nickname(&self.nickname) {
            errors.add("nickname", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Returned once a player has joined a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinedSession {
    /// Identifier of the joined session.
    pub session_id: Uuid,
    /// The freshly created roster entry.
    pub player: PlayerSummary,
    /// Snapshot taken right after the join.
    pub snapshot: SessionSnapshot,
}

/// Public projection of a response option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResponseSnapshot {
    /// Stable identifier referenced by submissions.
    pub id: Uuid,
    /// Display text.
    pub text: String,
    /// Score delta applied when binding.
    pub score_delta: i32,
    /// Budget delta applied when binding.
    pub budget_delta: i32,
}

/// Public projection of a decision card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CardSnapshot {
    /// Stable identifier for the card.
    pub id: Uuid,
    /// Short headline.
    pub title: String,
    /// Scenario text.
    pub description: String,
    /// Countdown budget in minutes.
    pub time_limit_minutes: u32,
    /// Ordered response options.
    pub responses: Vec<ResponseSnapshot>,
}

/// Public projection of a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamSummary {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Assigned color.
    pub color: TeamColorDto,
    /// Running score.
    pub score: i32,
    /// Running budget.
    pub budget: i32,
}

/// Public projection of a roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    /// Stable identifier, persisted client-side for reconnection.
    pub id: Uuid,
    /// Display name.
    pub nickname: String,
    /// Assigned team, if any.
    pub team_id: Option<Uuid>,
    /// Whether this player submits the team's binding decision.
    pub is_leader: bool,
    /// Soft connection flag.
    pub is_connected: bool,
    /// Whether a response is recorded for the current card.
    pub has_responded: bool,
    /// The recorded response for the current card, if any.
    pub response_id: Option<Uuid>,
}

/// Polled snapshot of everything a client needs to reconcile against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: Uuid,
    /// Display name of the scenario.
    pub name: String,
    /// Code players use to join.
    pub join_code: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// 0-based index of the active card; equals `total_cards` once completed.
    pub current_card_index: usize,
    /// Server-side instant the active card's countdown began. The sole
    /// source of truth for elapsed time.
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub card_started_at: Option<OffsetDateTime>,
    /// Number of cards in the deck.
    pub total_cards: usize,
    /// The deck, immutable once the session starts.
    pub cards: Vec<CardSnapshot>,
    /// Teams in creation order.
    pub teams: Vec<TeamSummary>,
    /// Roster in join order.
    pub players: Vec<PlayerSummary>,
}

impl SessionSnapshot {
    /// The active card projection, if the deck has not been exhausted.
    pub fn current_card(&self) -> Option<&CardSnapshot> {
        self.cards.get(self.current_card_index)
    }

    /// Look up a roster entry by id.
    pub fn player(&self, id: Uuid) -> Option<&PlayerSummary> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Look up a team by id.
    pub fn team(&self, id: Uuid) -> Option<&TeamSummary> {
        self.teams.iter().find(|t| t.id == id)
    }
}

impl From<&Response> for ResponseSnapshot {
    fn from(value: &Response) -> Self {
        Self {
            id: value.id,
            text: value.text.clone(),
            score_delta: value.effects.score,
            budget_delta: value.effects.budget,
        }
    }
}

impl From<&Card> for CardSnapshot {
    fn from(value: &Card) -> Self {
        Self {
            id: value.id,
            title: value.title.clone(),
            description: value.description.clone(),
            time_limit_minutes: value.time_limit_minutes,
            responses: value.responses.iter().map(Into::into).collect(),
        }
    }
}

impl From<&Team> for TeamSummary {
    fn from(value: &Team) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            color: value.color.into(),
            score: value.score,
            budget: value.budget,
        }
    }
}

impl From<&Player> for PlayerSummary {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id,
            nickname: value.nickname.clone(),
            team_id: value.team_id,
            is_leader: value.is_leader,
            is_connected: value.is_connected,
            has_responded: value.has_responded,
            response_id: value.response_id,
        }
    }
}

impl From<&Session> for SessionSnapshot {
    fn from(value: &Session) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            join_code: value.join_code.clone(),
            status: value.machine.status(),
            current_card_index: value.machine.current_card_index(),
            card_started_at: value.machine.card_started_at(),
            total_cards: value.machine.total_cards(),
            cards: value.cards.iter().map(Into::into).collect(),
            teams: value.teams.values().map(Into::into).collect(),
            players: value.players.values().map(Into::into).collect(),
        }
    }
}
