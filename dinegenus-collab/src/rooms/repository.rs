use std::{fmt::Display, str::FromStr};

use log::info;
use serde_json::Value;

use crate::{
    util::random_string, CollabContext, CollabError, CollabResult, DeleteOutcome, DocumentStore,
    FieldPath, FieldUpdate, Query, QueryCursor,
};

use super::{
    is_valid_room_code, now, Identity, Participant, Room, RoomCodeGenerator, RoomId, RoomMetadata,
    RoomStatus, VotingStatus,
};

/// The collection rooms are stored in
pub const ROOMS: &str = "rooms";

const PARTICIPANT_KEY_LENGTH: usize = 20;

/// Typed access to room documents.
pub struct RoomRepository<Db> {
    context: CollabContext<Db>,
    codes: RoomCodeGenerator,
}

/// A page of rooms, newest first
#[derive(Debug, Clone)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    /// `None` when the listing is exhausted
    pub next_cursor: Option<PageCursor>,
}

/// Opaque position in a room listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    created_at: i64,
    room_id: RoomId,
}

impl<Db> RoomRepository<Db>
where
    Db: DocumentStore,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        let codes = RoomCodeGenerator::new(context.config.max_code_attempts);
        Self::with_code_generator(context, codes)
    }

    pub fn with_code_generator(context: &CollabContext<Db>, codes: RoomCodeGenerator) -> Self {
        Self {
            context: context.clone(),
            codes,
        }
    }

    /// Creates an active room with the owner registered as its first participant.
    pub async fn create_room(&self, owner: &Identity, metadata: RoomMetadata) -> CollabResult<Room> {
        owner.validate()?;

        if metadata.name.trim().is_empty() {
            return Err(CollabError::Validation("room name must not be empty".to_string()));
        }

        if metadata.display_name.trim().is_empty() {
            return Err(CollabError::Validation(
                "display name must not be empty".to_string(),
            ));
        }

        let room_code = self.codes.generate_unique_code(self).await?;
        let owner_key = new_participant_key();

        let mut room = Room {
            id: RoomId::default(),
            room_code,
            name: metadata.name.trim().to_string(),
            location: metadata.location,
            owner_id: owner.user_id.clone(),
            status: RoomStatus::Active,
            voting_status: VotingStatus::Waiting,
            created_at: now(),
            recommendations: None,
            participants: Default::default(),
        };

        room.participants.insert(
            owner_key,
            Participant::new(owner, &metadata.display_name, true),
        );

        room.id = self.context.database.insert(ROOMS, room.to_document()?).await?;

        info!(
            "Room {} ({}) created by {}",
            room.name, room.room_code, room.owner_id
        );

        Ok(room)
    }

    pub async fn get_room_by_id(&self, room_id: &str) -> CollabResult<Option<Room>> {
        let document = self.context.database.get(ROOMS, room_id).await?;

        document
            .map(|d| Room::from_document(room_id, d))
            .transpose()
    }

    /// Looks up an active room by its code. Codes are case-insensitive.
    pub async fn get_room_by_code(&self, code: &str) -> CollabResult<Option<Room>> {
        let code = code.trim().to_ascii_uppercase();

        if !is_valid_room_code(&code) {
            return Ok(None);
        }

        let query = Query::new()
            .filter(FieldPath::new("roomCode"), code)
            .filter(FieldPath::new("status"), RoomStatus::Active.as_str())
            .limit(1);

        let snapshot = self
            .context
            .database
            .query(ROOMS, query)
            .await?
            .into_iter()
            .next();

        snapshot
            .map(|s| Room::from_document(&s.id, s.data))
            .transpose()
    }

    /// Lists active rooms, newest first. A page shorter than `limit` is the last one.
    pub async fn list_active_rooms(
        &self,
        limit: usize,
        cursor: Option<&PageCursor>,
    ) -> CollabResult<RoomPage> {
        let query = Query::new()
            .filter(FieldPath::new("status"), RoomStatus::Active.as_str())
            .order_by_desc(FieldPath::new("createdAt"))
            .start_after(cursor.map(PageCursor::to_query_cursor))
            .limit(limit);

        let rooms = self.fetch(query).await?;
        let next_cursor = next_cursor(&rooms, limit);

        Ok(RoomPage { rooms, next_cursor })
    }

    /// Lists completed rooms the user took part in, newest first.
    ///
    /// Pages are cut before filtering by participant, so a page can be shorter than
    /// `limit` and still be followed by more. Only `next_cursor` signals the end.
    pub async fn list_completed_rooms_for_user(
        &self,
        user_id: &str,
        limit: usize,
        cursor: Option<&PageCursor>,
    ) -> CollabResult<RoomPage> {
        let query = Query::new()
            .filter(FieldPath::new("votingStatus"), VotingStatus::Completed.as_str())
            .order_by_desc(FieldPath::new("createdAt"))
            .start_after(cursor.map(PageCursor::to_query_cursor))
            .limit(limit);

        let page = self.fetch(query).await?;
        let next_cursor = next_cursor(&page, limit);

        let rooms = page.into_iter().filter(|r| r.has_user(user_id)).collect();

        Ok(RoomPage { rooms, next_cursor })
    }

    /// Writes a single field of a room, leaving the rest of the document alone.
    pub async fn update_field(
        &self,
        room_id: &str,
        path: FieldPath,
        value: impl Into<Value>,
    ) -> CollabResult<()> {
        self.update_fields(room_id, vec![FieldUpdate::set(path, value)])
            .await
    }

    /// Applies several targeted updates as one write.
    pub async fn update_fields(&self, room_id: &str, updates: Vec<FieldUpdate>) -> CollabResult<()> {
        self.context
            .database
            .patch(ROOMS, room_id, updates)
            .await
            .map_err(CollabError::from)
    }

    /// Closes a room. Closed rooms no longer accept joins or votes, and free their code.
    pub async fn close_room(&self, room_id: &str) -> CollabResult<()> {
        self.update_field(room_id, FieldPath::new("status"), RoomStatus::Closed.as_str())
            .await?;

        info!("Room {} closed", room_id);
        Ok(())
    }

    /// Deletes a room. Deleting a room twice is not an error,
    /// but deleting a room that never existed is.
    pub async fn delete_room(&self, room_id: &str) -> CollabResult<DeleteOutcome> {
        let outcome = self.context.database.delete(ROOMS, room_id).await?;

        if outcome == DeleteOutcome::Deleted {
            info!("Room {} deleted", room_id);
        }

        Ok(outcome)
    }

    async fn fetch(&self, query: Query) -> CollabResult<Vec<Room>> {
        self.context
            .database
            .query(ROOMS, query)
            .await?
            .into_iter()
            .map(|s| Room::from_document(&s.id, s.data))
            .collect()
    }
}

/// Creates a new opaque participant key
pub fn new_participant_key() -> String {
    random_string(PARTICIPANT_KEY_LENGTH)
}

fn next_cursor(rooms: &[Room], limit: usize) -> Option<PageCursor> {
    if rooms.len() < limit {
        return None;
    }

    rooms.last().map(|room| PageCursor {
        created_at: room.created_at.timestamp_millis(),
        room_id: room.id.clone(),
    })
}

impl PageCursor {
    fn to_query_cursor(&self) -> QueryCursor {
        QueryCursor {
            value: self.created_at.into(),
            id: self.room_id.clone(),
        }
    }
}

impl Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.created_at, self.room_id)
    }
}

impl FromStr for PageCursor {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CollabError::Validation(format!("{s:?} is not a page cursor"));

        let (created_at, room_id) = s.split_once('-').ok_or_else(invalid)?;
        let created_at = created_at.parse().map_err(|_| invalid())?;

        if room_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            created_at,
            room_id: room_id.to_string(),
        })
    }
}
