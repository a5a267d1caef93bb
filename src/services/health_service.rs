use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload and the live session count.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.session_count())
}
