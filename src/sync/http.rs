//! HTTP implementation of [`SessionApi`] for clients polling a remote
//! backend.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    config::SyncTuning,
    dto::{
        host::{AdvanceOutcome, AdvanceRequest, AssignTeamRequest, ChangeStatusRequest},
        player::{LeadersResponded, LeaveRequest, SessionResults, SubmitResponseRequest, VoteTally},
        session::{JoinSessionRequest, JoinedSession, PlayerSummary, SessionSnapshot},
    },
    sync::api::{ApiError, ApiResult, SessionApi},
};

/// Error payload shape produced by the backend's error responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`SessionApi`] over REST/JSON via reqwest.
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: Arc<str>,
}

impl HttpSessionApi {
    /// Build a client against `base_url`, bounding every request by the
    /// configured timeout so a stalled call cannot block subsequent ticks.
    pub fn new(base_url: &str, tuning: &SyncTuning) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(tuning.request_timeout)
            .build()
            .map_err(|source| ApiError::transport("building HTTP client", source))?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        self.client.request(method, url)
    }

    async fn execute<T>(builder: reqwest::RequestBuilder) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = Self::send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::transport("decoding response body", source))
    }

    async fn execute_unit(builder: reqwest::RequestBuilder) -> ApiResult<()> {
        Self::send(builder).await.map(|_| ())
    }

    async fn send(builder: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = builder.send().await.map_err(|source| {
            if source.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::transport("sending request", source)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| format!("http status {status}"));

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ApiError::Invalid(message)
            }
            _ => ApiError::Transport {
                message,
                source: None,
            },
        })
    }
}

impl SessionApi for HttpSessionApi {
    fn fetch_snapshot(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let builder = self.request(Method::GET, &format!("sessions/{session_id}/snapshot"));
        Box::pin(Self::execute(builder))
    }

    fn change_status(
        &self,
        session_id: Uuid,
        request: ChangeStatusRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/status"))
            .json(&request);
        Box::pin(Self::execute(builder))
    }

    fn request_advance(
        &self,
        session_id: Uuid,
        request: AdvanceRequest,
    ) -> BoxFuture<'static, ApiResult<AdvanceOutcome>> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/advance"))
            .json(&request);
        Box::pin(Self::execute(builder))
    }

    fn submit_response(
        &self,
        session_id: Uuid,
        request: SubmitResponseRequest,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/responses"))
            .json(&request);
        Box::pin(Self::execute(builder))
    }

    fn vote_tally(
        &self,
        session_id: Uuid,
        team_id: Uuid,
        requester: Uuid,
    ) -> BoxFuture<'static, ApiResult<VoteTally>> {
        let builder = self
            .request(
                Method::GET,
                &format!("sessions/{session_id}/teams/{team_id}/votes"),
            )
            .query(&[("player_id", requester)]);
        Box::pin(Self::execute(builder))
    }

    fn leaders_responded(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<LeadersResponded>> {
        let builder = self.request(
            Method::GET,
            &format!("sessions/{session_id}/leaders-responded"),
        );
        Box::pin(Self::execute(builder))
    }

    fn validate_player(
        &self,
        session_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, ApiResult<PlayerSummary>> {
        let builder = self.request(
            Method::GET,
            &format!("sessions/{session_id}/players/{player_id}"),
        );
        Box::pin(Self::execute(builder))
    }

    fn results(&self, session_id: Uuid) -> BoxFuture<'static, ApiResult<SessionResults>> {
        let builder = self.request(Method::GET, &format!("sessions/{session_id}/results"));
        Box::pin(Self::execute(builder))
    }

    fn leave(&self, session_id: Uuid, player_id: Uuid) -> BoxFuture<'static, ApiResult<()>> {
        let builder = self
            .request(Method::POST, &format!("sessions/{session_id}/leave"))
            .json(&LeaveRequest { player_id });
        Box::pin(Self::execute_unit(builder))
    }

    fn assign_team(
        &self,
        session_id: Uuid,
        player_id: Uuid,
        request: AssignTeamRequest,
    ) -> BoxFuture<'static, ApiResult<SessionSnapshot>> {
        let builder = self
            .request(
                Method::POST,
                &format!("sessions/{session_id}/players/{player_id}/team"),
            )
            .json(&request);
        Box::pin(Self::execute(builder))
    }

    fn join(&self, request: JoinSessionRequest) -> BoxFuture<'static, ApiResult<JoinedSession>> {
        let builder = self.request(Method::POST, "sessions/join").json(&request);
        Box::pin(Self::execute(builder))
    }
}
