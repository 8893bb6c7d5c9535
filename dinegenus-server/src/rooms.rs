use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json,
};
use dinegenus_collab::{room_votes, PageCursor, Room as CollabRoom};

use crate::{
    auth::Caller,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        JoinRoomSchema, NewRoomSchema, PageParams, ValidatedJson, VoteSchema, VotingStatusSchema,
    },
    serialized::{
        JoinResult, LeaveResult, Recommendations, Room, RoomPage, RoomVotes, ToSerialized,
    },
    Router,
};

const MAX_PAGE_SIZE: usize = 50;

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(("UserId" = [])),
    responses(
        (status = 200, body = Room),
        (status = 400, description = "The room or the owner's identity is invalid"),
        (status = 409, description = "No unused room code could be found")
    )
)]
pub async fn create_room(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(&identity, body.into_metadata()?)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    params(PageParams),
    responses(
        (status = 200, body = RoomPage)
    )
)]
pub async fn list_active_rooms(
    State(context): State<ServerContext>,
    Query(params): Query<PageParams>,
) -> ServerResult<Json<RoomPage>> {
    let cursor = parse_cursor(&params)?;
    let limit = page_size(&params, context.collab.context().config.active_rooms_page_size);

    let page = context
        .collab
        .rooms
        .list_active_rooms(limit, cursor.as_ref())
        .await?;

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/history",
    tag = "rooms",
    params(PageParams),
    security(("UserId" = [])),
    responses(
        (status = 200, description = "Completed rooms the caller took part in, newest first. A page may hold fewer rooms than requested even when more follow.", body = RoomPage)
    )
)]
pub async fn voting_history(
    caller: Caller,
    State(context): State<ServerContext>,
    Query(params): Query<PageParams>,
) -> ServerResult<Json<RoomPage>> {
    let cursor = parse_cursor(&params)?;
    let limit = page_size(&params, context.collab.context().config.history_page_size);

    let page = context
        .collab
        .rooms
        .list_completed_rooms_for_user(caller.user_id(), limit, cursor.as_ref())
        .await?;

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    responses(
        (status = 200, body = Room),
        (status = 404, description = "The room does not exist")
    )
)]
pub async fn room(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = find_room(&context, &room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/code/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, body = Room),
        (status = 404, description = "No active room has this code")
    )
)]
pub async fn room_by_code(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .get_room_by_code(&code)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            resource: "room",
            identifier: code,
        })?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/join",
    tag = "rooms",
    request_body = JoinRoomSchema,
    params(("id" = String, Path, description = "Room id")),
    security(("UserId" = []), ("UserId" = [], "SessionId" = [])),
    responses(
        (status = 200, body = JoinResult),
        (status = 404, description = "The room does not exist"),
        (status = 409, description = "The room is closed")
    )
)]
pub async fn join_room(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<JoinRoomSchema>,
) -> ServerResult<Json<JoinResult>> {
    let outcome = context
        .collab
        .participants
        .join_room(&room_id, &identity, &body.display_name)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/leave",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    security(("UserId" = []), ("UserId" = [], "SessionId" = [])),
    responses(
        (status = 200, description = "When the owner leaves, the room is deleted", body = LeaveResult),
        (status = 404, description = "The room does not exist")
    )
)]
pub async fn leave_room(
    Caller(identity): Caller,
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<LeaveResult>> {
    let outcome = context
        .collab
        .participants
        .leave_room(&room_id, &identity)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/close",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    security(("UserId" = [])),
    responses(
        (status = 204, description = "The room no longer accepts joins or votes"),
        (status = 403, description = "Only the owner can close a room"),
        (status = 404, description = "The room does not exist")
    )
)]
pub async fn close_room(
    caller: Caller,
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<StatusCode> {
    let room = find_room(&context, &room_id).await?;

    if room.owner_id != caller.user_id() {
        return Err(ServerError::Forbidden(
            "Only the owner can close a room".to_string(),
        ));
    }

    context.collab.rooms.close_room(&room_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/votes",
    tag = "votes",
    request_body = VoteSchema,
    params(("id" = String, Path, description = "Room id")),
    security(("UserId" = [])),
    responses(
        (status = 204, description = "The vote was recorded, replacing any earlier vote"),
        (status = 403, description = "The participant belongs to another user"),
        (status = 404, description = "The room or the participant does not exist"),
        (status = 409, description = "The room is closed")
    )
)]
pub async fn submit_vote(
    caller: Caller,
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<StatusCode> {
    let room = find_room(&context, &room_id).await?;

    let owned_by_caller = room
        .participants
        .get(&body.participant_key)
        .map(|p| p.user_id == caller.user_id());

    if owned_by_caller == Some(false) {
        return Err(ServerError::Forbidden(
            "Votes can only be cast for yourself".to_string(),
        ));
    }

    context
        .collab
        .votes
        .submit_vote(&room_id, &body.participant_key, body.vote_data)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/votes",
    tag = "votes",
    params(("id" = String, Path, description = "Room id")),
    responses(
        (status = 200, body = RoomVotes),
        (status = 404, description = "The room does not exist")
    )
)]
pub async fn votes(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<RoomVotes>> {
    let room = find_room(&context, &room_id).await?;

    Ok(Json(room_votes(&room).to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/voting-status",
    tag = "votes",
    request_body = VotingStatusSchema,
    params(("id" = String, Path, description = "Room id")),
    security(("UserId" = [])),
    responses(
        (status = 204, description = "The voting status was updated"),
        (status = 400, description = "The status is not one of waiting, active or completed"),
        (status = 403, description = "Only the owner can change the voting status"),
        (status = 404, description = "The room does not exist")
    )
)]
pub async fn update_voting_status(
    caller: Caller,
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<VotingStatusSchema>,
) -> ServerResult<StatusCode> {
    let room = find_room(&context, &room_id).await?;

    if room.owner_id != caller.user_id() {
        return Err(ServerError::Forbidden(
            "Only the owner can change the voting status".to_string(),
        ));
    }

    context
        .collab
        .votes
        .update_voting_status(&room_id, &body.status)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/recommendations",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    responses(
        (status = 200, body = Recommendations),
        (status = 404, description = "No recommendations exist for the room yet"),
        (status = 503, description = "The recommendation service is not configured or unreachable")
    )
)]
pub async fn recommendations(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Recommendations>> {
    let client = context.recommendations.as_ref().ok_or_else(|| {
        ServerError::Unavailable("no recommendation service is configured".to_string())
    })?;

    let data = client
        .fetch(&room_id)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            resource: "recommendations",
            identifier: room_id,
        })?;

    Ok(Json(data.to_serialized()))
}

async fn find_room(context: &ServerContext, room_id: &str) -> ServerResult<CollabRoom> {
    context
        .collab
        .rooms
        .get_room_by_id(room_id)
        .await?
        .ok_or_else(|| ServerError::room_not_found(room_id))
}

fn parse_cursor(params: &PageParams) -> ServerResult<Option<PageCursor>> {
    params
        .cursor
        .as_deref()
        .map(str::parse::<PageCursor>)
        .transpose()
        .map_err(ServerError::from)
}

fn page_size(params: &PageParams, default: usize) -> usize {
    params.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_active_rooms).post(create_room))
        .route("/history", get(voting_history))
        .route("/code/:code", get(room_by_code))
        .route("/:id", get(room))
        .route("/:id/join", post(join_room))
        .route("/:id/leave", post(leave_room))
        .route("/:id/close", post(close_room))
        .route("/:id/votes", get(votes).post(submit_vote))
        .route("/:id/voting-status", put(update_voting_status))
        .route("/:id/recommendations", get(recommendations))
}

#[cfg(test)]
mod tests {
    use dinegenus_collab::{CollabConfig, Identity};
    use serde_json::json;

    use super::*;
    use crate::{schemas::LocationSchema, ServerConfig};

    fn context() -> ServerContext {
        ServerContext::new(&ServerConfig {
            port: 0,
            recommendations_url: None,
            collab: CollabConfig::default(),
        })
        .unwrap()
    }

    fn new_room() -> NewRoomSchema {
        serde_json::from_value(json!({
            "name": "Lunch",
            "displayName": "Owner",
            "location": {
                "address": "1 Main St",
                "coordinates": { "lat": 0.0, "lng": 0.0 }
            }
        }))
        .unwrap()
    }

    async fn create(context: &ServerContext) -> Room {
        let Json(room) = create_room(
            Caller(Identity::new("owner")),
            State(context.clone()),
            ValidatedJson(new_room()),
        )
        .await
        .unwrap();

        room
    }

    fn room_id(room: &Room) -> String {
        serde_json::to_value(room).unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_only_the_owner_changes_voting_status() {
        let context = context();
        let id = room_id(&create(&context).await);

        let denied = update_voting_status(
            Caller(Identity::new("ada")),
            State(context.clone()),
            Path(id.clone()),
            ValidatedJson(VotingStatusSchema {
                status: "active".to_string(),
            }),
        )
        .await;
        assert!(matches!(denied, Err(ServerError::Forbidden(_))));

        let invalid = update_voting_status(
            Caller(Identity::new("owner")),
            State(context.clone()),
            Path(id.clone()),
            ValidatedJson(VotingStatusSchema {
                status: "finished".to_string(),
            }),
        )
        .await;
        assert!(matches!(invalid, Err(ServerError::Invalid(_))));

        let accepted = update_voting_status(
            Caller(Identity::new("owner")),
            State(context.clone()),
            Path(id),
            ValidatedJson(VotingStatusSchema {
                status: "active".to_string(),
            }),
        )
        .await;
        assert_eq!(accepted.unwrap(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_votes_are_cast_for_yourself() {
        let context = context();
        let id = room_id(&create(&context).await);

        let Json(joined) = join_room(
            Caller(Identity::new("ada")),
            State(context.clone()),
            Path(id.clone()),
            ValidatedJson(JoinRoomSchema {
                display_name: "Ada".to_string(),
            }),
        )
        .await
        .unwrap();

        let key = serde_json::to_value(&joined).unwrap()["participantKey"]
            .as_str()
            .unwrap()
            .to_string();

        let vote = |user: &str| {
            submit_vote(
                Caller(Identity::new(user)),
                State(context.clone()),
                Path(id.clone()),
                ValidatedJson(VoteSchema {
                    participant_key: key.clone(),
                    vote_data: json!("dumplings"),
                }),
            )
        };

        assert!(matches!(vote("owner").await, Err(ServerError::Forbidden(_))));
        assert_eq!(vote("ada").await.unwrap(), StatusCode::NO_CONTENT);

        let Json(summary) = votes(State(context.clone()), Path(id)).await.unwrap();
        let summary = serde_json::to_value(summary).unwrap();

        assert_eq!(summary["progress"]["total"], json!(2));
        assert_eq!(summary["progress"]["completed"], json!(1));
        assert_eq!(summary["progress"]["progressPercent"], json!(50.0));
    }

    #[tokio::test]
    async fn test_missing_rooms_and_services() {
        let context = context();

        let missing = room(State(context.clone()), Path("nope".to_string())).await;
        assert!(matches!(missing, Err(ServerError::NotFound { .. })));

        let by_code = room_by_code(State(context.clone()), Path("ZZZZZZ".to_string())).await;
        assert!(matches!(by_code, Err(ServerError::NotFound { .. })));

        let unconfigured = recommendations(State(context), Path("nope".to_string())).await;
        assert!(matches!(unconfigured, Err(ServerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_are_rejected() {
        let context = context();
        let mut body = new_room();
        body.location = LocationSchema {
            address: "Nowhere".to_string(),
            name: None,
            coordinates: crate::schemas::CoordinatesSchema {
                lat: 0.0,
                lng: 200.0,
            },
        };

        let result = create_room(
            Caller(Identity::new("owner")),
            State(context),
            ValidatedJson(body),
        )
        .await;

        assert!(matches!(result, Err(ServerError::Invalid(_))));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let params = |limit| PageParams {
            cursor: None,
            limit,
        };

        assert_eq!(page_size(&params(None), 10), 10);
        assert_eq!(page_size(&params(Some(0)), 10), 1);
        assert_eq!(page_size(&params(Some(500)), 10), MAX_PAGE_SIZE);
    }
}
