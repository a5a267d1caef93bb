use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Lifecycle status of a session.
///
/// Transitions form a DAG: `Waiting → InProgress ⇄ Paused`, and any
/// non-terminal status can move to `Completed`. Nothing leaves `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session exists, players can join and be assigned to teams.
    Waiting,
    /// A card is active and its countdown is running.
    InProgress,
    /// The host froze decision flow; card index and anchor are untouched.
    Paused,
    /// Terminal status; results are available and immutable.
    Completed,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the session, anchoring the countdown for card 0.
    Start,
    /// Host pauses decision flow.
    Pause,
    /// Host resumes decision flow.
    Resume,
    /// Move to the next card. Carries the caller's last-observed card index
    /// as a compare-and-swap precondition so concurrent callers cannot
    /// double-advance.
    Advance {
        /// Card index the caller last observed.
        observed_index: usize,
    },
    /// Host ends the session early.
    Stop,
}

/// Error returned when an event cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event is not valid from the current status.
    #[error("invalid transition: {event:?} cannot be applied while {status:?}")]
    Invalid {
        /// Status the machine was in when the event was received.
        status: SessionStatus,
        /// The rejected event.
        event: SessionEvent,
    },
    /// An advance precondition no longer matches the authoritative index.
    /// Benign under concurrency: another caller already advanced, and the
    /// caller reconciles on its next poll instead of retrying.
    #[error("stale advance: observed index {observed} but authoritative index is {actual}")]
    Stale {
        /// Index the caller observed.
        observed: usize,
        /// Authoritative index at the time of the request.
        actual: usize,
    },
}

/// Authoritative status / card-index machine for one session.
///
/// Owns the three fields every polling client reconciles against: the
/// status, the monotonic `current_card_index`, and the countdown anchor
/// `card_started_at`. The anchor is set exactly once per
/// `(session, card index)` pair and never mutated until the index changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateMachine {
    status: SessionStatus,
    current_card_index: usize,
    card_started_at: Option<OffsetDateTime>,
    total_cards: usize,
}

impl SessionStateMachine {
    /// Create a machine in `Waiting` for a deck of `total_cards` cards.
    pub fn new(total_cards: usize) -> Self {
        Self {
            status: SessionStatus::Waiting,
            current_card_index: 0,
            card_started_at: None,
            total_cards,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 0-based index of the active card. Equals `total_cards` once the deck
    /// has been played to completion.
    pub fn current_card_index(&self) -> usize {
        self.current_card_index
    }

    /// Server-side instant the active card's countdown began, if any.
    pub fn card_started_at(&self) -> Option<OffsetDateTime> {
        self.card_started_at
    }

    /// Number of cards in the session's deck.
    pub fn total_cards(&self) -> usize {
        self.total_cards
    }

    /// Apply an event, moving the machine to its next status.
    ///
    /// `now` becomes the countdown anchor whenever a card starts (on `Start`
    /// and on every non-completing `Advance`). Returns the status after the
    /// transition.
    pub fn apply(
        &mut self,
        event: SessionEvent,
        now: OffsetDateTime,
    ) -> Result<SessionStatus, TransitionError> {
        match (self.status, event) {
            (SessionStatus::Waiting, SessionEvent::Start) => {
                self.status = SessionStatus::InProgress;
                self.card_started_at = Some(now);
            }
            (SessionStatus::InProgress, SessionEvent::Pause) => {
                self.status = SessionStatus::Paused;
            }
            (SessionStatus::Paused, SessionEvent::Resume) => {
                self.status = SessionStatus::InProgress;
            }
            (SessionStatus::InProgress, SessionEvent::Advance { observed_index }) => {
                if observed_index != self.current_card_index {
                    return Err(TransitionError::Stale {
                        observed: observed_index,
                        actual: self.current_card_index,
                    });
                }

                let next = self.current_card_index + 1;
                self.current_card_index = next;
                if next == self.total_cards {
                    self.status = SessionStatus::Completed;
                    self.card_started_at = None;
                } else {
                    self.card_started_at = Some(now);
                }
            }
            (status, SessionEvent::Stop) if status != SessionStatus::Completed => {
                self.status = SessionStatus::Completed;
                self.card_started_at = None;
            }
            (status, event) => return Err(TransitionError::Invalid { status, event }),
        }

        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionStatus {
        sm.apply(event, now()).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = SessionStateMachine::new(3);
        assert_eq!(sm.status(), SessionStatus::Waiting);
        assert_eq!(sm.current_card_index(), 0);
        assert!(sm.card_started_at().is_none());
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new(2);

        assert_eq!(apply(&mut sm, SessionEvent::Start), SessionStatus::InProgress);
        assert_eq!(sm.card_started_at(), Some(now()));

        assert_eq!(apply(&mut sm, SessionEvent::Pause), SessionStatus::Paused);
        assert_eq!(apply(&mut sm, SessionEvent::Resume), SessionStatus::InProgress);

        assert_eq!(
            apply(&mut sm, SessionEvent::Advance { observed_index: 0 }),
            SessionStatus::InProgress
        );
        assert_eq!(sm.current_card_index(), 1);

        assert_eq!(
            apply(&mut sm, SessionEvent::Advance { observed_index: 1 }),
            SessionStatus::Completed
        );
        assert_eq!(sm.current_card_index(), 2);
        assert!(sm.card_started_at().is_none());
    }

    #[test]
    fn stale_advance_is_rejected_without_mutation() {
        let mut sm = SessionStateMachine::new(5);
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Advance { observed_index: 0 });

        let before = sm.clone();
        let err = sm
            .apply(SessionEvent::Advance { observed_index: 0 }, now())
            .unwrap_err();

        assert_eq!(err, TransitionError::Stale { observed: 0, actual: 1 });
        assert_eq!(sm, before);
    }

    #[test]
    fn advance_requires_in_progress() {
        let mut sm = SessionStateMachine::new(3);
        let err = sm
            .apply(SessionEvent::Advance { observed_index: 0 }, now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { .. }));

        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Pause);
        let err = sm
            .apply(SessionEvent::Advance { observed_index: 0 }, now())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Invalid { status: SessionStatus::Paused, .. }
        ));
    }

    #[test]
    fn pause_and_resume_leave_index_and_anchor_untouched() {
        let mut sm = SessionStateMachine::new(3);
        apply(&mut sm, SessionEvent::Start);
        let anchor = sm.card_started_at();

        apply(&mut sm, SessionEvent::Pause);
        assert_eq!(sm.current_card_index(), 0);
        assert_eq!(sm.card_started_at(), anchor);

        apply(&mut sm, SessionEvent::Resume);
        assert_eq!(sm.current_card_index(), 0);
        assert_eq!(sm.card_started_at(), anchor);
    }

    #[test]
    fn advance_refreshes_anchor_for_the_new_card() {
        let mut sm = SessionStateMachine::new(3);
        sm.apply(SessionEvent::Start, now()).unwrap();

        let later = now() + Duration::minutes(5);
        sm.apply(SessionEvent::Advance { observed_index: 0 }, later)
            .unwrap();
        assert_eq!(sm.card_started_at(), Some(later));
    }

    #[test]
    fn stop_completes_from_any_non_terminal_status() {
        for setup in [
            Vec::new(),
            vec![SessionEvent::Start],
            vec![SessionEvent::Start, SessionEvent::Pause],
        ] {
            let mut sm = SessionStateMachine::new(3);
            for event in setup {
                apply(&mut sm, event);
            }
            assert_eq!(apply(&mut sm, SessionEvent::Stop), SessionStatus::Completed);
        }
    }

    #[test]
    fn nothing_leaves_completed() {
        let mut sm = SessionStateMachine::new(1);
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Advance { observed_index: 0 });
        assert_eq!(sm.status(), SessionStatus::Completed);

        for event in [
            SessionEvent::Start,
            SessionEvent::Pause,
            SessionEvent::Resume,
            SessionEvent::Advance { observed_index: 1 },
            SessionEvent::Stop,
        ] {
            let err = sm.apply(event, now()).unwrap_err();
            assert!(matches!(err, TransitionError::Invalid { .. }), "{event:?}");
        }
    }
}
