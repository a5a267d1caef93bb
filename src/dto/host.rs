use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::common::Actor, state::state_machine::SessionStatus};

/// Status mutation a host can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    /// `Waiting → InProgress`, anchors card 0.
    Start,
    /// `InProgress → Paused`.
    Pause,
    /// `Paused → InProgress`.
    Resume,
    /// Any non-terminal status → `Completed`.
    Stop,
}

/// Payload for the session status mutation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    /// Requested transition.
    pub action: StatusAction,
    /// Identity the request acts under; must be the host.
    pub actor: Actor,
}

/// Payload for a card advancement request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    /// Card index the caller last observed: the compare-and-swap
    /// precondition making concurrent advancement safe.
    pub observed_index: usize,
    /// Identity the request acts under; host or any roster member.
    pub actor: Actor,
}

/// Result of an advancement request. A stale precondition yields
/// `applied: false` with the authoritative index, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvanceOutcome {
    /// Whether this request performed the transition.
    pub applied: bool,
    /// Authoritative card index after the request.
    pub current_card_index: usize,
    /// Session status after the request.
    pub status: SessionStatus,
}

/// Payload to assign a player to a team, optionally promoting them to
/// leader. Host-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignTeamRequest {
    /// Destination team.
    pub team_id: Uuid,
    /// Promote the player to team leader, demoting any current one.
    #[serde(default)]
    pub make_leader: bool,
    /// Identity the request acts under; must be the host.
    pub actor: Actor,
}
