//! The per-view polling loop feeding the sync components.
//!
//! One loop per active session view. The loop is strictly sequential, so at
//! most one snapshot request is in flight; a tick that would overlap the
//! previous one simply happens later instead of queueing. Fetch failures
//! keep the last good snapshot and retry on the next tick.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::SyncTuning,
    dto::{common::Actor, player::VoteTally, session::SessionSnapshot},
    state::state_machine::SessionStatus,
    sync::{
        SessionView, SyncEvent,
        api::{ApiError, SessionApi},
        arbiter::{AdvanceReason, AdvancementArbiter},
        context::SyncContext,
    },
};

pub(crate) struct PollLoop {
    pub api: Arc<dyn SessionApi>,
    pub session_id: Uuid,
    pub actor: Actor,
    pub tuning: SyncTuning,
    pub view_tx: watch::Sender<SessionView>,
    pub events_tx: mpsc::UnboundedSender<SyncEvent>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl PollLoop {
    pub async fn run(mut self) {
        let mut ctx = SyncContext::new(self.tuning.settle_delay);
        let arbiter =
            AdvancementArbiter::new(self.api.clone(), self.session_id, self.actor);
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            let interval = self.current_interval();
            tokio::select! {
                _ = sleep(interval) => {}
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            // racing the tick against shutdown drops any response that
            // arrives after cancellation instead of applying it
            tokio::select! {
                keep_going = self.tick(&mut ctx, &arbiter) => {
                    if !keep_going {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!(session_id = %self.session_id, "poll loop stopped");
    }

    /// Short interval while the session runs, longer otherwise, bounding
    /// both staleness and load. Before the first snapshot we poll fast.
    fn current_interval(&self) -> Duration {
        let active = self
            .view_tx
            .borrow()
            .snapshot
            .as_ref()
            .is_none_or(|s| s.status == SessionStatus::InProgress);
        if active {
            self.tuning.poll_interval_active
        } else {
            self.tuning.poll_interval_idle
        }
    }

    /// One poll cycle. Returns false when the loop should end.
    async fn tick(&mut self, ctx: &mut SyncContext, arbiter: &AdvancementArbiter) -> bool {
        let snapshot = match self.api.fetch_snapshot(self.session_id).await {
            Ok(snapshot) => snapshot,
            Err(ApiError::NotFound(message)) => {
                warn!(session_id = %self.session_id, %message, "session is gone; stopping poll loop");
                let _ = self.events_tx.send(SyncEvent::SessionGone);
                return false;
            }
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "snapshot fetch failed; keeping last good state"
                );
                self.refresh_remaining(ctx);
                return true;
            }
        };

        if ctx.detector.observe(&snapshot) {
            self.propagate(ctx, snapshot).await;
        } else {
            // no-op poll: only smooth the displayed countdown
            self.refresh_remaining(ctx);
        }

        self.evaluate_consensus(ctx, arbiter).await;

        if let Some(expired_index) = ctx.timer.tick(OffsetDateTime::now_utc()) {
            let _ = self.events_tx.send(SyncEvent::AdvanceRequested {
                card_index: expired_index,
                reason: AdvanceReason::TimerExpired,
            });
            arbiter
                .request_advance(expired_index, AdvanceReason::TimerExpired)
                .await;
        }

        if ctx.settling()
            && let Some(last) = ctx.last_snapshot.clone()
        {
            for change in ctx.take_settled_changes(&last, Instant::now()) {
                let _ = self.events_tx.send(SyncEvent::ScoreChanged(change));
            }
        }

        true
    }

    /// Push a changed snapshot through the downstream components.
    async fn propagate(&self, ctx: &mut SyncContext, snapshot: SessionSnapshot) {
        let previous = ctx.last_snapshot.take();

        if let Some(prev) = &previous
            && snapshot.current_card_index > prev.current_card_index
        {
            ctx.note_index_change(prev, Instant::now());
        }

        let just_completed = snapshot.status == SessionStatus::Completed
            && previous
                .as_ref()
                .is_none_or(|prev| prev.status != SessionStatus::Completed);
        if just_completed {
            self.announce_completion().await;
        }

        ctx.timer.resync(&snapshot);
        let tally = self.fetch_tally_if_leader(&snapshot).await;
        let remaining = ctx.timer.remaining(OffsetDateTime::now_utc());

        ctx.last_snapshot = Some(snapshot.clone());
        let _ = self.view_tx.send(SessionView {
            snapshot: Some(snapshot),
            remaining_secs: remaining,
            tally,
        });
    }

    /// Once per poll while in progress: if every leader has responded and
    /// the one-shot guard for this index is still open, request advancement.
    async fn evaluate_consensus(&self, ctx: &mut SyncContext, arbiter: &AdvancementArbiter) {
        let Some(last) = &ctx.last_snapshot else {
            return;
        };
        let index = last.current_card_index;
        if last.status != SessionStatus::InProgress || !ctx.consensus_advance_pending(index) {
            return;
        }

        match self.api.leaders_responded(self.session_id).await {
            Ok(check) if check.all_responded && check.current_card_index == index => {
                ctx.mark_consensus_advance(index);
                let _ = self.events_tx.send(SyncEvent::AdvanceRequested {
                    card_index: index,
                    reason: AdvanceReason::LeaderConsensus,
                });
                arbiter
                    .request_advance(index, AdvanceReason::LeaderConsensus)
                    .await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "leader-consensus check failed; retrying next tick"
                );
            }
        }
    }

    /// Leaders also see their team's advisory tally alongside the snapshot.
    async fn fetch_tally_if_leader(&self, snapshot: &SessionSnapshot) -> Option<VoteTally> {
        if snapshot.status != SessionStatus::InProgress {
            return None;
        }
        let player_id = self.actor.player_id?;
        let player = snapshot.player(player_id)?;
        if !player.is_leader {
            return None;
        }
        let team_id = player.team_id?;

        match self.api.vote_tally(self.session_id, team_id, player_id).await {
            Ok(tally) => Some(tally),
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "vote tally fetch failed"
                );
                None
            }
        }
    }

    async fn announce_completion(&self) {
        let results = match self.api.results(self.session_id).await {
            Ok(results) => Some(results),
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "results fetch failed after completion"
                );
                None
            }
        };
        let _ = self.events_tx.send(SyncEvent::Completed { results });
    }

    /// Local 1 Hz smoothing between propagated snapshots; never trusted as
    /// ground truth beyond the next poll.
    fn refresh_remaining(&self, ctx: &SyncContext) {
        let remaining = ctx.timer.remaining(OffsetDateTime::now_utc());
        self.view_tx.send_if_modified(|view| {
            if view.remaining_secs == remaining {
                return false;
            }
            view.remaining_secs = remaining;
            true
        });
    }
}
