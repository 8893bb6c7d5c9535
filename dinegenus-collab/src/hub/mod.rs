mod subscription;

use futures_util::{stream::BoxStream, StreamExt};
use log::{debug, warn};
use tokio::sync::oneshot;

pub use subscription::*;

use crate::{
    room_votes, CollabContext, CollabError, CollabResult, DocumentStore, Room, RoomVotes, ROOMS,
};

/// Room snapshots of a single room. `None` means the room was deleted, and is always the last item.
pub type RoomStream = BoxStream<'static, CollabResult<Option<Room>>>;
/// Vote aggregates of a single room, recomputed on every change
pub type VoteStream = BoxStream<'static, CollabResult<Option<RoomVotes>>>;

/// Delivers room snapshots and vote aggregates to subscribers as the room changes.
pub struct SubscriptionHub<Db> {
    context: CollabContext<Db>,
    registry: Registry,
}

impl<Db> SubscriptionHub<Db>
where
    Db: DocumentStore,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
            registry: Default::default(),
        }
    }

    /// Streams the room, starting with its current snapshot.
    ///
    /// The stream ends after the room is deleted or after a transport error.
    pub fn room_stream(&self, room_id: &str) -> RoomStream {
        let id = room_id.to_string();

        self.context
            .database
            .watch(ROOMS, room_id)
            .map(move |item| match item {
                Ok(Some(document)) => Room::from_document(&id, document).map(Some),
                Ok(None) => {
                    debug!("Room {} is gone, ending its stream", id);
                    Ok(None)
                }
                Err(e) => {
                    warn!("Lost the stream of room {}: {}", id, e);
                    Err(e.into())
                }
            })
            .boxed()
    }

    /// Streams the vote aggregate of the room, starting with the current one.
    pub fn vote_stream(&self, room_id: &str) -> VoteStream {
        self.room_stream(room_id)
            .map(|item| item.map(|room| room.as_ref().map(room_votes)))
            .boxed()
    }

    /// Calls `on_update` with the current room and again after every change to it.
    /// `on_update` receives `None` once if the room is deleted, and `on_error` is
    /// called instead if the store becomes unreachable. Either one ends the subscription.
    pub fn watch_room<U, E>(&self, room_id: &str, on_update: U, on_error: E) -> Subscription
    where
        U: FnMut(Option<Room>) + Send + 'static,
        E: FnOnce(CollabError) + Send + 'static,
    {
        self.deliver(self.room_stream(room_id), on_update, on_error)
    }

    /// Like [SubscriptionHub::watch_room], but delivers vote aggregates.
    pub fn watch_room_votes<U, E>(&self, room_id: &str, on_update: U, on_error: E) -> Subscription
    where
        U: FnMut(Option<RoomVotes>) + Send + 'static,
        E: FnOnce(CollabError) + Send + 'static,
    {
        self.deliver(self.vote_stream(room_id), on_update, on_error)
    }

    /// Returns the number of subscriptions still delivering
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Cancels every open subscription
    pub fn dispose(&self) {
        self.registry.retain(|_, handle| {
            handle.abort();
            false
        });
    }

    fn deliver<T, U, E>(
        &self,
        mut stream: BoxStream<'static, CollabResult<Option<T>>>,
        mut on_update: U,
        on_error: E,
    ) -> Subscription
    where
        T: Send + 'static,
        U: FnMut(Option<T>) + Send + 'static,
        E: FnOnce(CollabError) + Send + 'static,
    {
        let id = SubscriptionId::new();
        let registry = self.registry.clone();
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // The entry must exist before the task can remove it
            let _ = registered_rx.await;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(snapshot) => on_update(snapshot),
                    Err(e) => {
                        on_error(e);
                        break;
                    }
                }
            }

            registry.remove(&id);
        });

        self.registry.insert(id, task.abort_handle());
        let _ = registered_tx.send(());

        Subscription::new(id, task.abort_handle(), self.registry.clone())
    }
}
