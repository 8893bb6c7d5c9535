use std::sync::Arc;

use log::info;

use crate::{CollabError, CollabResult, DocumentStore, FieldUpdate};

use super::{
    new_participant_key, participant_path, reconcile_join, reconcile_leave, Identity, JoinPlan,
    Participant, ParticipantKey, Room, RoomRepository,
};

/// Resolves join and leave requests into participant map writes.
pub struct ParticipantReconciler<Db> {
    rooms: Arc<RoomRepository<Db>>,
}

/// The result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub participant_key: ParticipantKey,
    /// True if this exact user and session was already in the room
    pub already_joined: bool,
}

/// What a leave did to the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The owner left, so the room is gone
    RoomDeleted,
    /// These participant entries were removed
    Left { removed: Vec<ParticipantKey> },
    /// The identity had no entry in the room
    NotJoined,
}

impl<Db> ParticipantReconciler<Db>
where
    Db: DocumentStore,
{
    pub fn new(rooms: Arc<RoomRepository<Db>>) -> Self {
        Self { rooms }
    }

    /// Joins a room. Rejoining from the same session is a no-op, and joining from
    /// a new session replaces every other entry of the same user.
    pub async fn join_room(
        &self,
        room_id: &str,
        identity: &Identity,
        display_name: &str,
    ) -> CollabResult<JoinOutcome> {
        identity.validate()?;

        if display_name.trim().is_empty() {
            return Err(CollabError::Validation(
                "display name must not be empty".to_string(),
            ));
        }

        let room = self.active_room(room_id).await?;

        let plan = reconcile_join(&room.participants, identity);

        if let JoinPlan::AlreadyJoined(key) = &plan {
            return Ok(JoinOutcome {
                participant_key: key.clone(),
                already_joined: true,
            });
        }

        let participant_key = new_participant_key();
        let is_owner = identity.user_id == room.owner_id;
        let participant = Participant::new(identity, display_name, is_owner);

        let updates = plan.field_updates(&participant_key, &participant)?;
        self.rooms.update_fields(room_id, updates).await?;

        info!(
            "{} joined room {} as {}",
            identity.user_id, room_id, participant_key
        );

        Ok(JoinOutcome {
            participant_key,
            already_joined: false,
        })
    }

    /// Leaves a room. When the owner leaves, the room is deleted for everyone.
    ///
    /// Leaving a room that was already deleted reports [LeaveOutcome::RoomDeleted],
    /// so a retried owner leave succeeds. Rooms that never existed are
    /// [CollabError::NotFound].
    pub async fn leave_room(&self, room_id: &str, identity: &Identity) -> CollabResult<LeaveOutcome> {
        identity.validate()?;

        let Some(room) = self.rooms.get_room_by_id(room_id).await? else {
            // Fails with NotFound unless the room has been deleted before
            self.rooms.delete_room(room_id).await?;
            return Ok(LeaveOutcome::RoomDeleted);
        };

        if identity.user_id == room.owner_id {
            self.rooms.delete_room(room_id).await?;
            return Ok(LeaveOutcome::RoomDeleted);
        }

        let removed = reconcile_leave(&room.participants, identity);

        if removed.is_empty() {
            return Ok(LeaveOutcome::NotJoined);
        }

        let updates = removed
            .iter()
            .map(|key| FieldUpdate::delete(participant_path(key)))
            .collect();

        self.rooms.update_fields(room_id, updates).await?;

        info!("{} left room {}", identity.user_id, room_id);

        Ok(LeaveOutcome::Left { removed })
    }

    async fn active_room(&self, room_id: &str) -> CollabResult<Room> {
        let room = self
            .rooms
            .get_room_by_id(room_id)
            .await?
            .ok_or_else(|| CollabError::room_not_found(room_id))?;

        if !room.is_active() {
            return Err(CollabError::Conflict(format!("room {room_id} is closed")));
        }

        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Collab, Coordinates, Location, MemoryStore, RoomMetadata};

    fn metadata() -> RoomMetadata {
        RoomMetadata {
            name: "Dinner".to_string(),
            location: Location {
                address: "2 Side St".to_string(),
                name: None,
                coordinates: Coordinates { lat: 1.0, lng: 2.0 },
            },
            display_name: "Owner".to_string(),
        }
    }

    async fn setup() -> (Collab<MemoryStore>, Room) {
        let collab = Collab::new(MemoryStore::new(), Default::default());
        let room = collab
            .rooms
            .create_room(&Identity::new("owner"), metadata())
            .await
            .unwrap();

        (collab, room)
    }

    async fn entries_for(collab: &Collab<MemoryStore>, room_id: &str, user_id: &str) -> usize {
        let room = collab.rooms.get_room_by_id(room_id).await.unwrap().unwrap();
        room.participants
            .values()
            .filter(|p| p.user_id == user_id)
            .count()
    }

    #[tokio::test]
    async fn test_join_is_idempotent_per_session() {
        let (collab, room) = setup().await;
        let ada = Identity::new("ada").with_session("tab-1");

        let first = collab.participants.join_room(&room.id, &ada, "Ada").await.unwrap();
        let second = collab.participants.join_room(&room.id, &ada, "Ada").await.unwrap();

        assert!(!first.already_joined);
        assert!(second.already_joined);
        assert_eq!(first.participant_key, second.participant_key);
        assert_eq!(entries_for(&collab, &room.id, "ada").await, 1);
    }

    #[tokio::test]
    async fn test_last_session_wins() {
        let (collab, room) = setup().await;

        let old = collab
            .participants
            .join_room(&room.id, &Identity::new("ada").with_session("tab-1"), "Ada")
            .await
            .unwrap();

        let new = collab
            .participants
            .join_room(&room.id, &Identity::new("ada").with_session("tab-2"), "Ada")
            .await
            .unwrap();

        assert_ne!(old.participant_key, new.participant_key);
        assert_eq!(entries_for(&collab, &room.id, "ada").await, 1);

        let stored = collab.rooms.get_room_by_id(&room.id).await.unwrap().unwrap();
        let participant = &stored.participants[&new.participant_key];
        assert_eq!(participant.session_id.as_deref(), Some("tab-2"));
        assert!(!participant.is_owner);
    }

    #[tokio::test]
    async fn test_join_rejects_missing_and_closed_rooms() {
        let (collab, room) = setup().await;
        let ada = Identity::new("ada");

        let missing = collab.participants.join_room("nope", &ada, "Ada").await;
        assert!(matches!(missing, Err(CollabError::NotFound { .. })));

        let nameless = collab.participants.join_room(&room.id, &ada, " ").await;
        assert!(matches!(nameless, Err(CollabError::Validation(_))));

        collab.rooms.close_room(&room.id).await.unwrap();
        let closed = collab.participants.join_room(&room.id, &ada, "Ada").await;
        assert!(matches!(closed, Err(CollabError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_leave_removes_matching_entries() {
        let (collab, room) = setup().await;
        let ada = Identity::new("ada").with_session("tab-1");

        let joined = collab.participants.join_room(&room.id, &ada, "Ada").await.unwrap();

        let other_session = collab
            .participants
            .leave_room(&room.id, &Identity::new("ada").with_session("tab-9"))
            .await
            .unwrap();
        assert_eq!(other_session, LeaveOutcome::NotJoined);

        let left = collab.participants.leave_room(&room.id, &ada).await.unwrap();
        assert_eq!(
            left,
            LeaveOutcome::Left {
                removed: vec![joined.participant_key]
            }
        );

        assert_eq!(entries_for(&collab, &room.id, "ada").await, 0);
        assert_eq!(entries_for(&collab, &room.id, "owner").await, 1);
    }

    #[tokio::test]
    async fn test_owner_leave_deletes_room() {
        let (collab, room) = setup().await;

        collab
            .participants
            .join_room(&room.id, &Identity::new("ada"), "Ada")
            .await
            .unwrap();

        let outcome = collab
            .participants
            .leave_room(&room.id, &Identity::new("owner"))
            .await
            .unwrap();

        assert_eq!(outcome, LeaveOutcome::RoomDeleted);
        assert!(collab.rooms.get_room_by_id(&room.id).await.unwrap().is_none());

        let retried = collab
            .participants
            .leave_room(&room.id, &Identity::new("owner"))
            .await
            .unwrap();
        assert_eq!(retried, LeaveOutcome::RoomDeleted);

        let after = collab
            .participants
            .leave_room(&room.id, &Identity::new("ada"))
            .await
            .unwrap();
        assert_eq!(after, LeaveOutcome::RoomDeleted);

        let never_existed = collab
            .participants
            .leave_room("never-existed", &Identity::new("owner"))
            .await;
        assert!(matches!(never_existed, Err(CollabError::NotFound { .. })));
    }
}
