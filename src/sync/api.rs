//! Abstraction over the session API consumed by the sync engine.
//!
//! Every engine component talks to the backend through [`SessionApi`] so the
//! same loop drives an HTTP deployment (`HttpSessionApi`) or an in-process
//! one ([`LoopbackApi`]), which is also how the engine is exercised in tests.

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dto::{
        host::{AdvanceOutcome, AdvanceRequest, AssignTeamRequest, ChangeStatusRequest},
        player::{
            LeadersResponded, SessionResults, SubmitResponseRequest, VoteTally,
        },
        session::{JoinSessionRequest, JoinedSession, PlayerSummary, SessionSnapshot},
    },
    error::ServiceError,
    services::{decision_service, host_service, session_service},
    state::SharedState,
};

/// Result alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error raised by a [`SessionApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an answer (network or backend hiccup).
    /// Transient: the poll loop retries on its next tick.
    #[error("transport failure: {message}")]
    Transport {
        /// Human-readable failure description.
        message: String,
        /// Underlying transport error, when one exists.
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// The request exceeded its bound. Treated as transient.
    #[error("request timed out")]
    Timeout,
    /// The actor is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The referenced session, player, or team does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The mutation conflicts with already-recorded state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request payload was rejected.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl ApiError {
    /// Construct a transport error from any underlying failure.
    pub fn transport(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether retrying on the next poll tick is the right reaction.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transport { .. } | ApiError::Timeout)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(message) => ApiError::Unauthorized(message),
            ServiceError::InvalidInput(message) => ApiError::Invalid(message),
            ServiceError::InvalidState(message) => ApiError::Conflict(message),
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::Conflict(message) => ApiError::Conflict(message),
        }
    }
}

/// Request/response surface the sync engine polls and mutates through.
/// Mirrors the REST routes one-for-one.
pub trait SessionApi: Send + Sync {
    /// Fetch the polled session snapshot.
    fn fetch_snapshot(&self, session_id: Uuid)
    -> BoxFuture<'static, ApiResult<SessionSnapshot>>;

    /// Request a status transition (start / pause / resume / stop).
    fn change_status(
        &self,
        session_id: Uuid,
        request: ChangeStatusRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>>;

    /// Request a card advancement conditioned on the observed index.
    fn request_advance(
        &self,
        session_id: Uuid,
        request: AdvanceRequest,
    ) -> BoxFuture<'static, ApiResult<AdvanceOutcome>>;

    /// Record a player's response for the current card.
    fn submit_response(
        &self,
        session_id: Uuid,
        request: SubmitResponseRequest,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>>;

    /// Leader-only advisory vote tally for the current card.
    fn vote_tally(
        &self,
        session_id: Uuid,
        team_id: Uuid,
        requester: Uuid,
    ) -> BoxFuture<'static, ApiResult<VoteTally>>;

    /// Whether every populated team's leader has responded.
    fn leaders_responded(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<LeadersResponded>>;

    /// Confirm a player id still exists in the roster.
    fn validate_player(
        &self,
        session_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>>;

    /// Final results once the session is completed.
    fn results(&self, session_id: Uuid) -> BoxFuture<'static, ApiResult<SessionResults>>;

    /// Best-effort leave notification.
    fn leave(&self, session_id: Uuid, player_id: Uuid) -> BoxFuture<'static, ApiResult<()>>;

    /// Assign a player to a team (host-only).
    fn assign_team(
        &self,
        session_id: Uuid,
        player_id: Uuid,
        request: AssignTeamRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>>;

    /// Join a session by code, creating a roster entry.
    fn join(&self, request: JoinSessionRequest) -> BoxFuture<'static, ApiResult<JoinedSession>>;
}

/// In-process [`SessionApi`] that calls the service layer directly. Used by
/// embedders running client and server in one process, and by the test
/// suite to drive the whole engine without sockets.
#[derive(Clone)]
pub struct LoopbackApi {
    state: SharedState,
}

impl LoopbackApi {
    /// Wrap a shared application state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl SessionApi for LoopbackApi {
    fn fetch_snapshot(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let state = self.state.clone();
        Box::pin(async move {
            session_service::snapshot(&state, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn change_status(
        &self,
        session_id: Uuid,
        request: ChangeStatusRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let state = self.state.clone();
        Box::pin(async move {
            host_service::change_status(&state, session_id, request)
                .await
                .map_err(Into::into)
        })
    }

    fn request_advance(
        &self,
        session_id: Uuid,
        request: AdvanceRequest,
    ) -> BoxFuture<'static, ApiResult<AdvanceOutcome>> {
        let state = self.state.clone();
        Box::pin(async move {
            host_service::advance_card(&state, session_id, request)
                .await
                .map_err(Into::into)
        })
    }

    fn submit_response(
        &self,
        session_id: Uuid,
        request: SubmitResponseRequest,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>> {
        let state = self.state.clone();
        Box::pin(async move {
            decision_service::submit_response(&state, session_id, request)
                .await
                .map_err(Into::into)
        })
    }

    fn vote_tally(
        &self,
        session_id: Uuid,
        team_id: Uuid,
        requester: Uuid,
    ) -> BoxFuture<'static, ApiResult<VoteTally>> {
        let state = self.state.clone();
        Box::pin(async move {
            decision_service::vote_tally(&state, session_id, team_id, requester)
                .await
                .map_err(Into::into)
        })
    }

    fn leaders_responded(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<LeadersResponded>> {
        let state = self.state.clone();
        Box::pin(async move {
            decision_service::leaders_responded(&state, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn validate_player(
        &self,
        session_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>> {
        let state = self.state.clone();
        Box::pin(async move {
            session_service::validate_player(&state, session_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn results(&self, session_id: Uuid) -> BoxFuture<'static, ApiResult<SessionResults>> {
        let state = self.state.clone();
        Box::pin(async move {
            session_service::results(&state, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn leave(&self, session_id: Uuid, player_id: Uuid) -> BoxFuture<'static, ApiResult<()>> {
        let state = self.state.clone();
        Box::pin(async move {
            session_service::leave_session(&state, session_id, player_id).await;
            Ok(())
        })
    }

    fn assign_team(
        &self,
        session_id: Uuid,
        player_id: Uuid,
        request: AssignTeamRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let state = self.state.clone();
        Box::pin(async move {
            host_service::assign_team(&state, session_id, player_id, request)
                .await
                .map_err(Into::into)
        })
    }

    fn join(&self, request: JoinSessionRequest) -> BoxFuture<'static, ApiResult<JoinedSession>> {
        let state = self.state.clone();
        Box::pin(async move {
            session_service::join_session(&state, request)
                .await
                .map_err(Into::into)
        })
    }
}
