use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use dinegenus_collab::CollabResult;
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::{
    context::ServerContext,
    serialized::{Room, RoomVotes, ToSerialized},
    Router,
};

/// Turns a hub stream item into an event.
///
/// Events are named `snapshot`, `deleted` (the room is gone) and `error` (the
/// store connection was lost). The stream ends after `deleted` or `error`.
fn to_event<T, S>(item: CollabResult<Option<T>>) -> Result<Event, axum::Error>
where
    T: ToSerialized<S>,
    S: Serialize,
{
    match item {
        Ok(Some(value)) => Event::default()
            .event("snapshot")
            .json_data(value.to_serialized()),
        Ok(None) => Ok(Event::default().event("deleted").data("null")),
        Err(e) => Ok(Event::default().event("error").data(e.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/events",
    tag = "events",
    params(("id" = String, Path, description = "Room id")),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "The current room, followed by every change to it",
            body = Room
        )
    )
)]
pub async fn room_events(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = context
        .collab
        .hub
        .room_stream(&room_id)
        .map(to_event::<_, Room>);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/votes/events",
    tag = "events",
    params(("id" = String, Path, description = "Room id")),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "The current votes of the room, followed by every change to them",
            body = RoomVotes
        )
    )
)]
pub async fn vote_events(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = context
        .collab
        .hub
        .vote_stream(&room_id)
        .map(to_event::<_, RoomVotes>);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new()
        .route("/:id/events", get(room_events))
        .route("/:id/votes/events", get(vote_events))
}
