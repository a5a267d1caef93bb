use indexmap::IndexMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::state_machine::SessionStateMachine;

/// HSV color assigned to a team from the configured presets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamColor {
    /// Hue in degrees.
    pub h: f32,
    /// Saturation, 0..=1.
    pub s: f32,
    /// Value, 0..=1.
    pub v: f32,
}

/// Numeric deltas applied to a team when a response becomes binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectDeltas {
    /// Change to the team's running score.
    pub score: i32,
    /// Change to the team's running budget.
    pub budget: i32,
}

/// One selectable response on a decision card.
#[derive(Debug, Clone)]
pub struct Response {
    /// Stable identifier referenced by submissions and outcomes.
    pub id: Uuid,
    /// Display text.
    pub text: String,
    /// Deltas applied when this response is a team's binding choice.
    pub effects: EffectDeltas,
}

/// A timed decision card. Immutable once the session starts.
#[derive(Debug, Clone)]
pub struct Card {
    /// Stable identifier for the card.
    pub id: Uuid,
    /// Short headline shown to players.
    pub title: String,
    /// Scenario text the teams deliberate over.
    pub description: String,
    /// Countdown budget for this card.
    pub time_limit_minutes: u32,
    /// Ordered response options.
    pub responses: Vec<Response>,
}

impl Card {
    /// Countdown budget in whole seconds.
    pub fn time_limit_secs(&self) -> i64 {
        i64::from(self.time_limit_minutes) * 60
    }

    /// Look up a response on this card.
    pub fn response(&self, id: Uuid) -> Option<&Response> {
        self.responses.iter().find(|r| r.id == id)
    }
}

/// Team info tracked during a session. Scores mutate only as a side effect
/// of card advancement, never directly by clients.
#[derive(Debug, Clone)]
pub struct Team {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen by the host.
    pub name: String,
    /// Color from the configured presets.
    pub color: TeamColor,
    /// Running score.
    pub score: i32,
    /// Running budget.
    pub budget: i32,
}

impl Team {
    /// Apply a binding response's deltas to the running totals.
    pub fn apply_effects(&mut self, effects: &EffectDeltas) {
        self.score += effects.score;
        self.budget += effects.budget;
    }
}

/// A participant in the session.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier, also persisted client-side for reconnection.
    pub id: Uuid,
    /// Display name chosen at join time.
    pub nickname: String,
    /// Team the host assigned this player to, if any.
    pub team_id: Option<Uuid>,
    /// Whether this player submits the team's binding decision.
    /// At most one leader per team, assigned by the host.
    pub is_leader: bool,
    /// Soft connection flag; flipped by the leave notification.
    pub is_connected: bool,
    /// Whether a response is recorded for the current card.
    pub has_responded: bool,
    /// The recorded response for the current card. Immutable once set until
    /// the card advances.
    pub response_id: Option<Uuid>,
}

/// Binding choices recorded when a card advanced.
#[derive(Debug, Clone)]
pub struct CardOutcome {
    /// Index of the card these bindings were recorded for.
    pub card_index: usize,
    /// Team id → binding response id, in team order.
    pub bindings: IndexMap<Uuid, Uuid>,
}

/// Aggregated state for one live session: the authoritative machine plus
/// the deck, roster, and recorded per-card outcomes.
#[derive(Debug, Clone)]
pub struct Session {
    /// Primary key of the session.
    pub id: Uuid,
    /// Display name of the scenario.
    pub name: String,
    /// Short code players use to join.
    pub join_code: String,
    /// Creation timestamp for auditing/debugging.
    pub created_at: OffsetDateTime,
    /// Status / card-index / anchor machine.
    pub machine: SessionStateMachine,
    /// Ordered deck of decision cards.
    pub cards: Vec<Card>,
    /// Participating teams keyed by id, in creation order.
    pub teams: IndexMap<Uuid, Team>,
    /// Roster keyed by player id, in join order.
    pub players: IndexMap<Uuid, Player>,
    /// Binding outcomes recorded at each advance.
    pub outcomes: Vec<CardOutcome>,
}

impl Session {
    /// Build a new in-memory session in the waiting state.
    pub fn new(name: String, join_code: String, cards: Vec<Card>, teams: Vec<Team>) -> Self {
        let machine = SessionStateMachine::new(cards.len());
        Self {
            id: Uuid::new_v4(),
            name,
            join_code,
            created_at: OffsetDateTime::now_utc(),
            machine,
            cards,
            teams: teams.into_iter().map(|t| (t.id, t)).collect(),
            players: IndexMap::new(),
            outcomes: Vec::new(),
        }
    }

    /// The active card and its index, if the deck has not been exhausted.
    pub fn current_card(&self) -> Option<(usize, &Card)> {
        let index = self.machine.current_card_index();
        self.cards.get(index).map(|card| (index, card))
    }

    /// Iterate over the members of one team.
    pub fn team_members(&self, team_id: Uuid) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |p| p.team_id == Some(team_id))
    }

    /// The designated leader of a team, if one has been assigned.
    pub fn leader_of(&self, team_id: Uuid) -> Option<&Player> {
        self.team_members(team_id).find(|p| p.is_leader)
    }

    /// Advisory vote tally for a team on the current card: response id →
    /// count over the non-leader members, zero counts included, in the
    /// card's response order. Leader submissions are binding, not votes.
    pub fn vote_tally(&self, team_id: Uuid) -> IndexMap<Uuid, usize> {
        let mut tally: IndexMap<Uuid, usize> = self
            .current_card()
            .map(|(_, card)| card.responses.iter().map(|r| (r.id, 0)).collect())
            .unwrap_or_default();

        for member in self.team_members(team_id).filter(|p| !p.is_leader) {
            if let Some(choice) = member.response_id
                && let Some(count) = tally.get_mut(&choice)
            {
                *count += 1;
            }
        }

        tally
    }

    /// Whether every populated team's leader has a recorded response for the
    /// current card. Teams without members are ignored; a populated team
    /// lacking a leader can never satisfy the condition.
    pub fn all_leaders_responded(&self) -> bool {
        let mut populated = 0;
        for team_id in self.teams.keys() {
            if self.team_members(*team_id).next().is_none() {
                continue;
            }
            populated += 1;
            match self.leader_of(*team_id) {
                Some(leader) if leader.has_responded => {}
                _ => return false,
            }
        }
        populated > 0
    }

    /// Each team's binding response for the current card: the leader's
    /// recorded selection, where one exists.
    pub fn binding_choices(&self) -> IndexMap<Uuid, Uuid> {
        self.teams
            .keys()
            .filter_map(|team_id| {
                let leader = self.leader_of(*team_id)?;
                leader.response_id.map(|response| (*team_id, response))
            })
            .collect()
    }

    /// Clear every player's per-card submission state for a fresh card.
    pub fn reset_card_responses(&mut self) {
        for player in self.players.values_mut() {
            player.has_responded = false;
            player.response_id = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> TeamColor {
        TeamColor { h: 0.0, s: 1.0, v: 1.0 }
    }

    fn card_with_responses(n: usize) -> Card {
        Card {
            id: Uuid::new_v4(),
            title: "Outage".into(),
            description: "Primary datacenter lost power".into(),
            time_limit_minutes: 5,
            responses: (0..n)
                .map(|i| Response {
                    id: Uuid::new_v4(),
                    text: format!("option {i}"),
                    effects: EffectDeltas::default(),
                })
                .collect(),
        }
    }

    fn session_with_one_team() -> (Session, Uuid) {
        let team = Team {
            id: Uuid::new_v4(),
            name: "Blue".into(),
            color: color(),
            score: 0,
            budget: 100,
        };
        let team_id = team.id;
        let session = Session::new(
            "drill".into(),
            "ABC234".into(),
            vec![card_with_responses(2)],
            vec![team],
        );
        (session, team_id)
    }

    fn add_player(session: &mut Session, team_id: Uuid, is_leader: bool) -> Uuid {
        let player = Player {
            id: Uuid::new_v4(),
            nickname: format!("p{}", session.players.len()),
            team_id: Some(team_id),
            is_leader,
            is_connected: true,
            has_responded: false,
            response_id: None,
        };
        let id = player.id;
        session.players.insert(id, player);
        id
    }

    #[test]
    fn tally_counts_only_non_leader_votes() {
        let (mut session, team_id) = session_with_one_team();
        let response = session.cards[0].responses[0].id;

        let leader = add_player(&mut session, team_id, true);
        let voter = add_player(&mut session, team_id, false);
        for id in [leader, voter] {
            let player = session.players.get_mut(&id).unwrap();
            player.has_responded = true;
            player.response_id = Some(response);
        }

        let tally = session.vote_tally(team_id);
        assert_eq!(tally.get(&response), Some(&1));
        assert_eq!(tally.values().sum::<usize>(), 1);
    }

    #[test]
    fn leaders_responded_requires_every_populated_team() {
        let (mut session, team_id) = session_with_one_team();
        assert!(!session.all_leaders_responded(), "no members yet");

        let leader = add_player(&mut session, team_id, true);
        assert!(!session.all_leaders_responded(), "leader has not responded");

        let response = session.cards[0].responses[1].id;
        let player = session.players.get_mut(&leader).unwrap();
        player.has_responded = true;
        player.response_id = Some(response);
        assert!(session.all_leaders_responded());
    }

    #[test]
    fn populated_team_without_leader_blocks_consensus() {
        let (mut session, team_id) = session_with_one_team();
        add_player(&mut session, team_id, false);
        assert!(!session.all_leaders_responded());
    }
}
