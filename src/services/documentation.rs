use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Crisis Room Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::join_session,
        crate::routes::session::get_snapshot,
        crate::routes::host::change_status,
        crate::routes::host::advance_card,
        crate::routes::host::assign_team,
        crate::routes::player::submit_response,
        crate::routes::player::get_vote_tally,
        crate::routes::player::get_leaders_responded,
        crate::routes::player::validate_player,
        crate::routes::player::get_results,
        crate::routes::player::leave_session,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::TeamColorDto,
            crate::dto::common::Actor,
            crate::dto::common::ActorRole,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinedSession,
            crate::dto::session::SessionSnapshot,
            crate::dto::session::PlayerSummary,
            crate::dto::session::TeamSummary,
            crate::dto::session::CardSnapshot,
            crate::dto::session::ResponseSnapshot,
            crate::dto::host::ChangeStatusRequest,
            crate::dto::host::AdvanceRequest,
            crate::dto::host::AdvanceOutcome,
            crate::dto::host::AssignTeamRequest,
            crate::dto::player::SubmitResponseRequest,
            crate::dto::player::VoteTally,
            crate::dto::player::LeadersResponded,
            crate::dto::player::LeaveRequest,
            crate::dto::player::SessionResults,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session bootstrap, join, and polling"),
        (name = "host", description = "Host controls and advancement"),
        (name = "player", description = "Submissions, tallies, and results"),
    )
)]
pub struct ApiDoc;
