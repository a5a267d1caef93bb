pub mod decision_service;
pub mod documentation;
pub mod health_service;
pub mod host_service;
pub mod session_service;

use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{SessionHandle, SharedState},
};

/// Resolve a live session handle or produce a not-found error.
pub(crate) fn require_session(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionHandle, ServiceError> {
    state
        .session(id)
        .ok_or_else(|| ServiceError::NotFound(format!("session `{id}` not found")))
}
