//! Structural fingerprinting of snapshots to suppress no-op propagation.
//!
//! Most polls return a snapshot identical, for rendering purposes, to the
//! previous one. Propagating those anyway would reset local selection and
//! animation state downstream, so only the fields that drive decisions are
//! fingerprinted: status, card index, the roster tuples, and team totals.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::dto::session::SessionSnapshot;

/// Compute the structural fingerprint of a snapshot's render-relevant fields.
pub fn fingerprint(snapshot: &SessionSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();

    snapshot.status.hash(&mut hasher);
    snapshot.current_card_index.hash(&mut hasher);

    for player in &snapshot.players {
        (
            player.id,
            player.nickname.as_str(),
            player.team_id,
            player.is_leader,
            player.is_connected,
            player.has_responded,
            player.response_id,
        )
            .hash(&mut hasher);
    }

    for team in &snapshot.teams {
        (team.id, team.score, team.budget).hash(&mut hasher);
    }

    hasher.finish()
}

/// Propagation gate that remembers the last seen fingerprint.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<u64>,
}

impl ChangeDetector {
    /// Fresh detector; the first observed snapshot always propagates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot and report whether it differs from the previous one.
    pub fn observe(&mut self, snapshot: &SessionSnapshot) -> bool {
        let current = fingerprint(snapshot);
        if self.last == Some(current) {
            return false;
        }
        self.last = Some(current);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::{common::TeamColorDto, session::TeamSummary},
        state::state_machine::SessionStatus,
    };
    use uuid::Uuid;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            id: Uuid::new_v4(),
            name: "drill".into(),
            join_code: "ABC234".into(),
            status: SessionStatus::InProgress,
            current_card_index: 0,
            card_started_at: None,
            total_cards: 3,
            cards: Vec::new(),
            teams: vec![TeamSummary {
                id: Uuid::new_v4(),
                name: "Blue".into(),
                color: TeamColorDto {
                    hue: 0.0,
                    saturation: 1.0,
                    value: 1.0,
                },
                score: 0,
                budget: 100,
            }],
            players: Vec::new(),
        }
    }

    #[test]
    fn identical_snapshots_do_not_propagate_twice() {
        let mut detector = ChangeDetector::new();
        let snapshot = snapshot();
        assert!(detector.observe(&snapshot));
        assert!(!detector.observe(&snapshot));
    }

    #[test]
    fn index_and_score_changes_propagate() {
        let mut detector = ChangeDetector::new();
        let mut snapshot = snapshot();
        assert!(detector.observe(&snapshot));

        snapshot.current_card_index = 1;
        assert!(detector.observe(&snapshot));

        snapshot.teams[0].score += 10;
        assert!(detector.observe(&snapshot));
    }

    #[test]
    fn status_change_propagates() {
        let mut detector = ChangeDetector::new();
        let mut snapshot = snapshot();
        assert!(detector.observe(&snapshot));

        snapshot.status = SessionStatus::Paused;
        assert!(detector.observe(&snapshot));
        assert!(!detector.observe(&snapshot));
    }
}
