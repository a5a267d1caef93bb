//! Client-side synchronization engine.
//!
//! Many independently-polling actors (the host, each team leader, regular
//! players, observers) must agree on what card is active, how much time
//! remains, and what happens next, using nothing but periodic snapshots
//! over a request/response API. This module owns that loop: a poll loop
//! per session view feeds a [`change_detector`], which gates propagation
//! into the [`timer`] reconciler and the view state; advancement decisions
//! (timer expiry, leader consensus, host action) flow back through the
//! [`arbiter`] as compare-and-swap conditioned requests.

pub mod api;
pub mod arbiter;
pub mod change_detector;
pub mod context;
#[cfg(feature = "http-api")]
pub mod http;
pub mod identity;
mod poller;
pub mod timer;

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    config::SyncTuning,
    dto::{
        common::Actor,
        host::{AssignTeamRequest, ChangeStatusRequest, StatusAction},
        player::{SessionResults, SubmitResponseRequest, VoteTally},
        session::{PlayerSummary, SessionSnapshot},
    },
    state::state_machine::SessionStatus,
    sync::{
        api::{ApiError, ApiResult, SessionApi},
        arbiter::AdvanceReason,
        context::ScoreChange,
        poller::PollLoop,
        timer::TimerReconciler,
    },
};

pub use self::api::LoopbackApi;
#[cfg(feature = "http-api")]
pub use self::http::HttpSessionApi;
pub use self::identity::{IdentityStore, Reconnection, StoredIdentity};

/// Everything a view renders, re-derived from the latest snapshot.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    /// Last good snapshot, if one has been fetched yet.
    pub snapshot: Option<SessionSnapshot>,
    /// Seconds left on the active card's countdown (display smoothing
    /// between polls; the anchor timestamp is the ground truth).
    pub remaining_secs: u64,
    /// The leader's advisory tally for their team, when applicable.
    pub tally: Option<VoteTally>,
}

/// Out-of-band notifications emitted by the engine.
#[derive(Debug)]
pub enum SyncEvent {
    /// A team's totals moved across a card advancement, observed after the
    /// settle delay.
    ScoreChanged(ScoreChange),
    /// This client decided to request an advancement.
    AdvanceRequested {
        /// Index the request was conditioned on.
        card_index: usize,
        /// What triggered the request.
        reason: AdvanceReason,
    },
    /// The session reached its terminal status.
    Completed {
        /// Final results, when they could be fetched.
        results: Option<SessionResults>,
    },
    /// A host mutation was rejected after its optimistic local application;
    /// the view has been rolled back.
    MutationFailed {
        /// Which mutation failed.
        action: &'static str,
        /// Backend rejection message.
        message: String,
    },
    /// The session no longer exists; the poll loop has stopped.
    SessionGone,
}

/// A host-triggered mutation routed through [`SessionSync::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMutation {
    /// Start the session.
    Start,
    /// Pause decision flow.
    Pause,
    /// Resume decision flow.
    Resume,
    /// End the session early.
    Stop,
    /// Advance to the next card, conditioned on the currently viewed index.
    NextCard,
    /// Assign a player to a team, optionally promoting them to leader.
    AssignTeam {
        /// Player to assign.
        player_id: Uuid,
        /// Destination team.
        team_id: Uuid,
        /// Promote to leader, demoting any current one.
        make_leader: bool,
    },
}

impl HostMutation {
    fn describe(&self) -> &'static str {
        match self {
            HostMutation::Start => "start",
            HostMutation::Pause => "pause",
            HostMutation::Resume => "resume",
            HostMutation::Stop => "stop",
            HostMutation::NextCard => "next card",
            HostMutation::AssignTeam { .. } => "assign team",
        }
    }

    fn status_action(&self) -> Option<StatusAction> {
        match self {
            HostMutation::Start => Some(StatusAction::Start),
            HostMutation::Pause => Some(StatusAction::Pause),
            HostMutation::Resume => Some(StatusAction::Resume),
            HostMutation::Stop => Some(StatusAction::Stop),
            _ => None,
        }
    }

    /// The status the view can optimistically show while the request is in
    /// flight.
    fn optimistic_status(&self) -> Option<SessionStatus> {
        match self {
            HostMutation::Start | HostMutation::Resume => Some(SessionStatus::InProgress),
            HostMutation::Pause => Some(SessionStatus::Paused),
            HostMutation::Stop => Some(SessionStatus::Completed),
            HostMutation::NextCard | HostMutation::AssignTeam { .. } => None,
        }
    }
}

/// Handle to one running session view sync loop.
///
/// Dropping (or [`stop`](Self::stop)ping) the handle cancels the poll loop;
/// responses arriving after cancellation are never applied.
pub struct SessionSync {
    api: Arc<dyn SessionApi>,
    session_id: Uuid,
    actor: Actor,
    view_tx: watch::Sender<SessionView>,
    events_tx: mpsc::UnboundedSender<SyncEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionSync {
    /// Spawn the poll loop for one session view, returning the handle and
    /// the engine's event stream.
    pub fn spawn(
        api: Arc<dyn SessionApi>,
        session_id: Uuid,
        actor: Actor,
        tuning: SyncTuning,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (view_tx, _) = watch::channel(SessionView::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(
            PollLoop {
                api: api.clone(),
                session_id,
                actor,
                tuning,
                view_tx: view_tx.clone(),
                events_tx: events_tx.clone(),
                shutdown_rx,
            }
            .run(),
        );

        (
            Self {
                api,
                session_id,
                actor,
                view_tx,
                events_tx,
                shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    /// The session this handle is bound to.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Subscribe to view updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// Whether the poll loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the poll loop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Best-effort leave notification, then cancel the poll loop. Safe to
    /// call during shutdown or navigation-away.
    pub async fn leave(&self) {
        if let Some(player_id) = self.actor.player_id {
            let _ = self.api.leave(self.session_id, player_id).await;
        }
        self.stop();
    }

    /// Submit this player's response for the current card. Duplicate
    /// submissions surface the backend's conflict to the caller; the stored
    /// selection is untouched.
    pub async fn submit_response(&self, response_id: Uuid) -> ApiResult<PlayerSummary> {
        let player_id = self.actor.player_id.ok_or_else(|| {
            ApiError::Invalid("submitting a response requires a player identity".into())
        })?;
        self.api
            .submit_response(
                self.session_id,
                SubmitResponseRequest {
                    player_id,
                    response_id,
                },
            )
            .await
    }

    /// Apply a host mutation: optimistic local change, confirming request,
    /// reconcile on success, roll back and report once on failure.
    ///
    /// Every host control goes through here; there is no second mutation
    /// path to keep consistent.
    pub async fn commit(&self, mutation: HostMutation) -> ApiResult<()> {
        let before = self.view_tx.borrow().clone();

        if let Some(status) = mutation.optimistic_status()
            && before.snapshot.is_some()
        {
            let mut optimistic = before.clone();
            if let Some(snapshot) = optimistic.snapshot.as_mut() {
                snapshot.status = status;
            }
            let _ = self.view_tx.send(optimistic);
        }

        match self.perform(&mutation).await {
            Ok(Some(snapshot)) => {
                let mut timer = TimerReconciler::new();
                timer.resync(&snapshot);
                let _ = self.view_tx.send(SessionView {
                    remaining_secs: timer.remaining(OffsetDateTime::now_utc()),
                    snapshot: Some(snapshot),
                    tally: before.tally,
                });
                Ok(())
            }
            // an advance reconciles through the next snapshot instead
            Ok(None) => Ok(()),
            Err(err) => {
                let _ = self.view_tx.send(before);
                let _ = self.events_tx.send(SyncEvent::MutationFailed {
                    action: mutation.describe(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn perform(&self, mutation: &HostMutation) -> ApiResult<Option<SessionSnapshot>> {
        if let Some(action) = mutation.status_action() {
            let snapshot = self
                .api
                .change_status(
                    self.session_id,
                    ChangeStatusRequest {
                        action,
                        actor: self.actor,
                    },
                )
                .await?;
            return Ok(Some(snapshot));
        }

        match *mutation {
            HostMutation::NextCard => {
                let observed_index = self
                    .view_tx
                    .borrow()
                    .snapshot
                    .as_ref()
                    .map(|s| s.current_card_index)
                    .ok_or_else(|| {
                        ApiError::Invalid("no snapshot observed yet; cannot advance".into())
                    })?;
                let arbiter = arbiter::AdvancementArbiter::new(
                    self.api.clone(),
                    self.session_id,
                    self.actor,
                );
                arbiter
                    .request_advance(observed_index, AdvanceReason::HostNext)
                    .await
                    .ok_or_else(|| ApiError::Transport {
                        message: "advance request failed".into(),
                        source: None,
                    })?;
                Ok(None)
            }
            HostMutation::AssignTeam {
                player_id,
                team_id,
                make_leader,
            } => {
                let snapshot = self
                    .api
                    .assign_team(
                        self.session_id,
                        player_id,
                        AssignTeamRequest {
                            team_id,
                            make_leader,
                            actor: self.actor,
                        },
                    )
                    .await?;
                Ok(Some(snapshot))
            }
            _ => unreachable!("status actions handled above"),
        }
    }
}

impl Drop for SessionSync {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
