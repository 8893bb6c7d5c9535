use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth::{SESSION_ID_HEADER, USER_ID_HEADER},
    rooms, schemas, serialized, sse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        rooms::create_room,
        rooms::list_active_rooms,
        rooms::voting_history,
        rooms::room,
        rooms::room_by_code,
        rooms::join_room,
        rooms::leave_room,
        rooms::close_room,
        rooms::submit_vote,
        rooms::votes,
        rooms::update_voting_status,
        rooms::recommendations,
        sse::room_events,
        sse::vote_events,
    ),
    components(schemas(
        schemas::NewRoomSchema,
        schemas::LocationSchema,
        schemas::CoordinatesSchema,
        schemas::JoinRoomSchema,
        schemas::VoteSchema,
        schemas::VotingStatusSchema,
        serialized::Room,
        serialized::Location,
        serialized::Participant,
        serialized::RoomPage,
        serialized::JoinResult,
        serialized::LeaveResult,
        serialized::VoteProgress,
        serialized::ParticipantVote,
        serialized::RoomVotes,
        serialized::Recommendations,
    )),
    modifiers(&Identity),
    tags(
        (name = "rooms", description = "Creating, finding, joining and leaving decision rooms"),
        (name = "votes", description = "Casting votes and driving the voting status"),
        (name = "events", description = "Live room updates as server sent events")
    ),
    info(
        description = "dinegenus-server exposes endpoints to run decision rooms"
    )
)]
pub struct ApiDoc;

struct Identity;

impl Modify for Identity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "UserId",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
            );
            components.add_security_scheme(
                "SessionId",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(SESSION_ID_HEADER))),
            );
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
