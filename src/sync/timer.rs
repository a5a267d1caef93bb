//! Countdown reconciliation against the server-anchored card clock.
//!
//! The anchor timestamp plus the card's time limit are the only ground
//! truth for elapsed time. Every propagated snapshot resynchronizes this
//! reconciler; the local per-tick decrement between polls is display
//! smoothing only and is never trusted beyond the next poll.

use time::OffsetDateTime;

use crate::{dto::session::SessionSnapshot, state::state_machine::SessionStatus};

/// Per-session countdown state, keyed by card index.
#[derive(Debug, Default)]
pub struct TimerReconciler {
    card_index: usize,
    anchor: Option<OffsetDateTime>,
    limit_secs: i64,
    running: bool,
    expiry_signaled_for: Option<usize>,
}

impl TimerReconciler {
    /// Fresh reconciler with no card.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive countdown parameters from a propagated snapshot.
    pub fn resync(&mut self, snapshot: &SessionSnapshot) {
        self.card_index = snapshot.current_card_index;
        self.anchor = snapshot.card_started_at;
        self.limit_secs = snapshot
            .current_card()
            .map(|card| i64::from(card.time_limit_minutes) * 60)
            .unwrap_or(0);
        self.running = snapshot.status == SessionStatus::InProgress;
    }

    /// Seconds left on the active card's countdown. Never negative; a card
    /// that has not been anchored yet reports its full budget.
    pub fn remaining(&self, now: OffsetDateTime) -> u64 {
        let remaining = match self.anchor {
            None => self.limit_secs,
            Some(anchor) => {
                let elapsed = (now - anchor).whole_seconds();
                self.limit_secs - elapsed
            }
        };
        remaining.clamp(0, self.limit_secs) as u64
    }

    /// Evaluate expiry, returning the expired card index exactly once per
    /// index. The signal re-arms only when the index changes, so idling at
    /// zero cannot fire repeatedly, and a paused session never fires.
    pub fn tick(&mut self, now: OffsetDateTime) -> Option<usize> {
        if !self.running || self.anchor.is_none() {
            return None;
        }
        if self.remaining(now) > 0 {
            return None;
        }
        if self.expiry_signaled_for == Some(self.card_index) {
            return None;
        }

        self.expiry_signaled_for = Some(self.card_index);
        Some(self.card_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::session::CardSnapshot;
    use uuid::Uuid;

    fn anchor() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn snapshot(index: usize, status: SessionStatus, anchored: bool) -> SessionSnapshot {
        let card = |i: usize| CardSnapshot {
            id: Uuid::new_v4(),
            title: format!("card {i}"),
            description: String::new(),
            time_limit_minutes: 2,
            responses: Vec::new(),
        };
        SessionSnapshot {
            id: Uuid::new_v4(),
            name: "drill".into(),
            join_code: "ABC234".into(),
            status,
            current_card_index: index,
            card_started_at: anchored.then(anchor),
            total_cards: 3,
            cards: (0..3).map(card).collect(),
            teams: Vec::new(),
            players: Vec::new(),
        }
    }

    #[test]
    fn remaining_counts_down_from_the_anchor() {
        let mut timer = TimerReconciler::new();
        timer.resync(&snapshot(0, SessionStatus::InProgress, true));

        assert_eq!(timer.remaining(anchor()), 120);
        assert_eq!(timer.remaining(anchor() + time::Duration::seconds(45)), 75);
    }

    #[test]
    fn remaining_is_zero_at_and_after_the_limit() {
        let mut timer = TimerReconciler::new();
        timer.resync(&snapshot(0, SessionStatus::InProgress, true));

        for extra in [0, 1, 600] {
            let at = anchor() + time::Duration::seconds(120 + extra);
            assert_eq!(timer.remaining(at), 0, "k={extra}");
        }
    }

    #[test]
    fn unanchored_card_reports_full_budget() {
        let mut timer = TimerReconciler::new();
        timer.resync(&snapshot(0, SessionStatus::Waiting, false));
        assert_eq!(timer.remaining(anchor()), 120);
        assert!(timer.tick(anchor()).is_none());
    }

    #[test]
    fn expiry_fires_exactly_once_per_card_index() {
        let mut timer = TimerReconciler::new();
        timer.resync(&snapshot(0, SessionStatus::InProgress, true));

        let expired = anchor() + time::Duration::seconds(121);
        assert!(timer.tick(anchor()).is_none());
        assert_eq!(timer.tick(expired), Some(0));
        assert_eq!(timer.tick(expired), None);
        assert_eq!(timer.tick(expired + time::Duration::seconds(30)), None);

        // a new card re-arms the signal
        timer.resync(&snapshot(1, SessionStatus::InProgress, true));
        assert_eq!(timer.tick(expired), Some(1));
        assert_eq!(timer.tick(expired), None);
    }

    #[test]
    fn paused_sessions_never_signal_expiry() {
        let mut timer = TimerReconciler::new();
        timer.resync(&snapshot(0, SessionStatus::Paused, true));
        assert!(timer.tick(anchor() + time::Duration::seconds(500)).is_none());
    }
}
