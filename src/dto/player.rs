use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::session::TeamSummary;

/// Payload to record a player's response for the current card.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponseRequest {
    /// Roster id of the submitting player.
    pub player_id: Uuid,
    /// Selected response; must belong to the current card.
    pub response_id: Uuid,
}

/// Query parameters for the leader-only vote tally endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoteTallyQuery {
    /// Requesting player; must be the team's leader.
    pub player_id: Uuid,
}

/// Count of advisory votes for one response option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteCount {
    /// Response option being counted.
    pub response_id: Uuid,
    /// Number of non-leader teammates who selected it.
    pub count: usize,
}

/// Advisory vote tally for one team on the current card. Ephemeral:
/// discarded when the card advances, visible only to the team's leader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VoteTally {
    /// Team the tally belongs to.
    pub team_id: Uuid,
    /// Card the tally was computed for.
    pub card_id: Uuid,
    /// Index of that card at tally time.
    pub card_index: usize,
    /// Counts in the card's response order, zeros included.
    pub votes: Vec<VoteCount>,
}

/// Whether every populated team's leader has responded for the current card.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadersResponded {
    /// True once every populated team's leader has a recorded response.
    pub all_responded: bool,
    /// Card index the check was evaluated against.
    pub current_card_index: usize,
}

/// Best-effort leave notification payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaveRequest {
    /// Roster id of the departing player.
    pub player_id: Uuid,
}

/// Final ranking entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamStanding {
    /// 1-based rank by score; tied teams share a rank.
    pub rank: usize,
    /// The ranked team.
    pub team: TeamSummary,
}

/// Who won, with ties explicitly representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalOutcome {
    /// A single team holds the highest score.
    Winner {
        /// The winning team.
        team_id: Uuid,
    },
    /// No single winner: the top score is shared.
    Tie {
        /// Every team holding the top score.
        team_ids: Vec<Uuid>,
    },
}

/// One team's recorded binding choice for a played card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BindingSummary {
    /// Team the binding belongs to.
    pub team_id: Uuid,
    /// The leader's recorded response.
    pub response_id: Uuid,
}

/// Binding choices recorded when one card advanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CardOutcomeSummary {
    /// Index of the played card.
    pub card_index: usize,
    /// Each team's binding choice, in team order.
    pub bindings: Vec<BindingSummary>,
}

/// Final results, served only once the session is completed and immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionResults {
    /// Session the results belong to.
    pub session_id: Uuid,
    /// Teams ranked by score, highest first.
    pub standings: Vec<TeamStanding>,
    /// Winner or explicit tie.
    pub outcome: FinalOutcome,
    /// Per-card binding history.
    pub history: Vec<CardOutcomeSummary>,
}
