//! Advancement requests made safe under concurrency.
//!
//! Any number of clients (timer expiries, leader-consensus checks, the
//! host's next button) may decide to advance at the same observed index.
//! The arbiter sends the request with that index as its precondition and
//! treats a stale rejection as the benign no-op it is: the next poll
//! reconciles, nothing is retried blindly.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{common::Actor, host::{AdvanceOutcome, AdvanceRequest}},
    sync::api::SessionApi,
};

/// Why an advancement was requested; carried in logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    /// The local countdown for the observed card reached zero.
    TimerExpired,
    /// Every team leader has a recorded response for the observed card.
    LeaderConsensus,
    /// The host explicitly requested the next card.
    HostNext,
}

/// Issues advancement requests on behalf of one session view.
pub struct AdvancementArbiter {
    api: Arc<dyn SessionApi>,
    session_id: Uuid,
    actor: Actor,
}

impl AdvancementArbiter {
    /// Bind an arbiter to a session and the identity it acts under.
    pub fn new(api: Arc<dyn SessionApi>, session_id: Uuid, actor: Actor) -> Self {
        Self {
            api,
            session_id,
            actor,
        }
    }

    /// Request an advancement conditioned on `observed_index`.
    ///
    /// Returns the outcome when the backend answered, `None` on failure.
    /// A stale precondition comes back as `applied: false` and is logged at
    /// debug, not surfaced; transient failures are left for the next poll.
    pub async fn request_advance(
        &self,
        observed_index: usize,
        reason: AdvanceReason,
    ) -> Option<AdvanceOutcome> {
        let request = AdvanceRequest {
            observed_index,
            actor: self.actor,
        };

        match self.api.request_advance(self.session_id, request).await {
            Ok(outcome) => {
                if outcome.applied {
                    debug!(
                        session_id = %self.session_id,
                        observed_index,
                        ?reason,
                        new_index = outcome.current_card_index,
                        "advance applied"
                    );
                } else {
                    debug!(
                        session_id = %self.session_id,
                        observed_index,
                        ?reason,
                        actual = outcome.current_card_index,
                        "advance was stale; reconciling on next poll"
                    );
                }
                Some(outcome)
            }
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    observed_index,
                    ?reason,
                    error = %err,
                    "advance request failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::{
            common::Actor,
            host::{AssignTeamRequest, ChangeStatusRequest, StatusAction},
            session::JoinSessionRequest,
        },
        services::{host_service, session_service, session_service::tests::create_request},
        state::AppState,
        sync::api::LoopbackApi,
    };

    #[tokio::test]
    async fn concurrent_arbiters_advance_exactly_once() {
        let state = AppState::new(AppConfig::default());
        let snapshot = session_service::create_session(&state, create_request(10, &["Blue"]))
            .await
            .unwrap();
        let joined = session_service::join_session(
            &state,
            JoinSessionRequest {
                join_code: snapshot.join_code.clone(),
                nickname: "lead".into(),
            },
        )
        .await
        .unwrap();
        host_service::assign_team(
            &state,
            snapshot.id,
            joined.player.id,
            AssignTeamRequest {
                team_id: snapshot.teams[0].id,
                make_leader: true,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();
        host_service::change_status(
            &state,
            snapshot.id,
            ChangeStatusRequest {
                action: StatusAction::Start,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();

        let api: Arc<dyn SessionApi> = Arc::new(LoopbackApi::new(state.clone()));
        let x = AdvancementArbiter::new(api.clone(), snapshot.id, Actor::host());
        let y = AdvancementArbiter::new(api.clone(), snapshot.id, Actor::player(joined.player.id));

        let (a, b) = tokio::join!(
            x.request_advance(0, AdvanceReason::TimerExpired),
            y.request_advance(0, AdvanceReason::LeaderConsensus),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.current_card_index, 1);
        assert_eq!(b.current_card_index, 1);
        assert!(a.applied ^ b.applied, "exactly one of the two applies");

        let latest = session_service::snapshot(&state, snapshot.id).await.unwrap();
        assert_eq!(latest.current_card_index, 1);
    }
}
