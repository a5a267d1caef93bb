//! Per-session sync state: the propagation gate, the countdown reconciler,
//! the fired-once guards, and the score settle probe.
//!
//! Everything here is keyed to `current_card_index` and resets
//! deterministically when the index changes, tying guard lifetimes to
//! session state rather than to view lifecycle.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::{
    dto::session::SessionSnapshot,
    sync::{change_detector::ChangeDetector, timer::TimerReconciler},
};

/// A team's score movement observed across a card advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
    /// Team whose totals moved.
    pub team_id: Uuid,
    /// Team display name at observation time.
    pub team_name: String,
    /// Score movement across the advancement.
    pub score_delta: i32,
    /// Budget movement across the advancement.
    pub budget_delta: i32,
}

/// Baseline captured when the card index moves, diffed after the settle
/// delay. The store may apply effects slightly after the index changes, so
/// the snapshot that revealed the new index is not trusted for the diff.
#[derive(Debug)]
struct SettleProbe {
    deadline: Instant,
    baseline: Vec<(Uuid, String, i32, i32)>,
}

/// Mutable sync state for one session view.
pub(crate) struct SyncContext {
    /// Propagation gate over snapshot fingerprints.
    pub detector: ChangeDetector,
    /// Countdown reconciler, one-shot expiry keyed by card index.
    pub timer: TimerReconciler,
    /// Last snapshot that was propagated downstream.
    pub last_snapshot: Option<SessionSnapshot>,
    settle_delay: Duration,
    advance_requested_for: Option<usize>,
    settle: Option<SettleProbe>,
}

impl SyncContext {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            detector: ChangeDetector::new(),
            timer: TimerReconciler::new(),
            last_snapshot: None,
            settle_delay,
            advance_requested_for: None,
            settle: None,
        }
    }

    /// Whether the consensus auto-advance has not fired yet for `index`.
    pub fn consensus_advance_pending(&self, index: usize) -> bool {
        self.advance_requested_for != Some(index)
    }

    /// Arm the one-shot consensus guard for `index`.
    pub fn mark_consensus_advance(&mut self, index: usize) {
        self.advance_requested_for = Some(index);
    }

    /// Whether a settle probe is waiting to be diffed.
    pub fn settling(&self) -> bool {
        self.settle.is_some()
    }

    /// Record that the card index moved, capturing the pre-advancement team
    /// totals as the settle baseline.
    pub fn note_index_change(&mut self, previous: &SessionSnapshot, now: Instant) {
        self.settle = Some(SettleProbe {
            deadline: now + self.settle_delay,
            baseline: previous
                .teams
                .iter()
                .map(|t| (t.id, t.name.clone(), t.score, t.budget))
                .collect(),
        });
    }

    /// Once the settle delay has elapsed, diff the freshly re-queried
    /// snapshot against the baseline and clear the probe. Returns an empty
    /// vec while the probe is still settling or nothing moved.
    pub fn take_settled_changes(
        &mut self,
        current: &SessionSnapshot,
        now: Instant,
    ) -> Vec<ScoreChange> {
        let Some(probe) = self.settle.as_ref() else {
            return Vec::new();
        };
        if now < probe.deadline {
            return Vec::new();
        }

        let probe = self.settle.take().expect("probe presence checked above");
        probe
            .baseline
            .into_iter()
            .filter_map(|(team_id, team_name, score, budget)| {
                let team = current.teams.iter().find(|t| t.id == team_id)?;
                let change = ScoreChange {
                    team_id,
                    team_name,
                    score_delta: team.score - score,
                    budget_delta: team.budget - budget,
                };
                (change.score_delta != 0 || change.budget_delta != 0).then_some(change)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::common::TeamColorDto, dto::session::TeamSummary};
    use crate::state::state_machine::SessionStatus;

    fn snapshot_with_score(score: i32) -> SessionSnapshot {
        SessionSnapshot {
            id: Uuid::nil(),
            name: "drill".into(),
            join_code: "ABC234".into(),
            status: SessionStatus::InProgress,
            current_card_index: 0,
            card_started_at: None,
            total_cards: 2,
            cards: Vec::new(),
            teams: vec![TeamSummary {
                id: Uuid::nil(),
                name: "Blue".into(),
                color: TeamColorDto {
                    hue: 0.0,
                    saturation: 1.0,
                    value: 1.0,
                },
                score,
                budget: 0,
            }],
            players: Vec::new(),
        }
    }

    #[test]
    fn consensus_guard_is_one_shot_per_index() {
        let mut ctx = SyncContext::new(Duration::from_millis(10));
        assert!(ctx.consensus_advance_pending(0));
        ctx.mark_consensus_advance(0);
        assert!(!ctx.consensus_advance_pending(0));
        // next index re-arms the guard
        assert!(ctx.consensus_advance_pending(1));
    }

    #[test]
    fn settle_probe_waits_for_the_deadline() {
        let mut ctx = SyncContext::new(Duration::from_secs(1));
        let t0 = Instant::now();

        ctx.note_index_change(&snapshot_with_score(0), t0);
        let after = snapshot_with_score(10);

        assert!(ctx.take_settled_changes(&after, t0).is_empty());
        let changes = ctx.take_settled_changes(&after, t0 + Duration::from_secs(2));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].score_delta, 10);
        // probe is consumed
        assert!(
            ctx.take_settled_changes(&after, t0 + Duration::from_secs(3))
                .is_empty()
        );
    }

    #[test]
    fn unchanged_totals_produce_no_announcements() {
        let mut ctx = SyncContext::new(Duration::ZERO);
        let t0 = Instant::now();
        ctx.note_index_change(&snapshot_with_score(5), t0);
        assert!(
            ctx.take_settled_changes(&snapshot_with_score(5), t0 + Duration::from_millis(1))
                .is_empty()
        );
    }
}
