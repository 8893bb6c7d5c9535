mod config;
mod db;
mod error;
mod hub;
mod recommendations;
mod rooms;
mod util;
mod votes;

use std::sync::Arc;

pub use config::*;
pub use db::{
    DatabaseError, DeleteOutcome, Document, DocumentId, DocumentSnapshot, DocumentStore,
    DocumentWatch, FieldPath, FieldUpdate, FieldValue, MemoryStore, Query, QueryCursor,
    WatchStream,
};
pub use error::*;
pub use hub::*;
pub use recommendations::*;
pub use rooms::*;
pub use votes::*;

/// The dinegenus collab system, coordinating decision rooms, their participants, votes, and subscribers.
pub struct Collab<Db> {
    context: CollabContext<Db>,

    pub rooms: Arc<RoomRepository<Db>>,
    pub participants: ParticipantReconciler<Db>,
    pub votes: VoteCoordinator<Db>,
    pub hub: SubscriptionHub<Db>,
}

/// A type passed to the components of the collab system, to access the store and configuration.
pub struct CollabContext<Db> {
    pub database: Arc<Db>,
    pub config: CollabConfig,
}

impl<Db> Collab<Db>
where
    Db: DocumentStore,
{
    pub fn new(database: Db, config: CollabConfig) -> Self {
        Self::from_context(CollabContext::new(database, config))
    }

    pub fn from_context(context: CollabContext<Db>) -> Self {
        let rooms = Arc::new(RoomRepository::new(&context));

        Self {
            participants: ParticipantReconciler::new(rooms.clone()),
            votes: VoteCoordinator::new(rooms.clone()),
            hub: SubscriptionHub::new(&context),
            rooms,
            context,
        }
    }

    pub fn context(&self) -> &CollabContext<Db> {
        &self.context
    }

    /// Cancels every open subscription
    pub fn dispose(&self) {
        self.hub.dispose();
    }
}

impl<Db> CollabContext<Db> {
    pub fn new(database: Db, config: CollabConfig) -> Self {
        Self {
            database: Arc::new(database),
            config,
        }
    }
}

impl<Db> Clone for CollabContext<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metadata() -> RoomMetadata {
        RoomMetadata {
            name: "Team lunch".to_string(),
            location: Location {
                address: "10 Harbour Rd".to_string(),
                name: Some("Waterfront".to_string()),
                coordinates: Coordinates {
                    lat: 22.28,
                    lng: 114.16,
                },
            },
            display_name: "Olive".to_string(),
        }
    }

    #[tokio::test]
    async fn test_vote_end_to_end() {
        let collab = Collab::new(MemoryStore::new(), Default::default());
        let owner = Identity::new("olive").with_session("phone");

        let room = collab.rooms.create_room(&owner, metadata()).await.unwrap();
        let found = collab
            .rooms
            .get_room_by_code(&room.room_code)
            .await
            .unwrap()
            .expect("room can be found by its code");

        collab.votes.set_voting_status(&found.id, VotingStatus::Active).await.unwrap();

        let ada = collab
            .participants
            .join_room(&found.id, &Identity::new("ada").with_session("laptop"), "Ada")
            .await
            .unwrap();

        let bob = collab
            .participants
            .join_room(&found.id, &Identity::new("bob").with_session("tablet"), "Bob")
            .await
            .unwrap();

        for (key, choice) in [(&ada.participant_key, "ramen"), (&bob.participant_key, "pho")] {
            collab
                .votes
                .submit_vote(&found.id, key, json!({ "venue": choice }))
                .await
                .unwrap();
        }

        let (owner_key, _) = room.owner().unwrap();
        collab
            .votes
            .submit_vote(&found.id, owner_key, json!({ "venue": "ramen" }))
            .await
            .unwrap();

        let stored = collab.rooms.get_room_by_id(&found.id).await.unwrap().unwrap();
        let progress = compute_vote_status(&stored);

        assert_eq!(progress.total, 3);
        assert!(progress.all_completed);
        assert_eq!(progress.progress_percent, 100.);

        collab
            .votes
            .update_voting_status(&found.id, "completed")
            .await
            .unwrap();

        let history = collab
            .rooms
            .list_completed_rooms_for_user("ada", 10, None)
            .await
            .unwrap();

        assert_eq!(history.rooms.len(), 1);
        assert_eq!(history.rooms[0].id, room.id);
    }

    #[tokio::test]
    async fn test_dispose_cancels_subscriptions() {
        let collab = Collab::new(MemoryStore::new(), Default::default());
        let room = collab
            .rooms
            .create_room(&Identity::new("olive"), metadata())
            .await
            .unwrap();

        let subscription = collab.hub.watch_room(&room.id, |_| {}, |_| {});
        assert!(subscription.is_active());

        collab.dispose();

        assert!(!subscription.is_active());
        assert_eq!(collab.hub.active_count(), 0);
    }
}
