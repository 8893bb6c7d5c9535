use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet, VecDeque},
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::util::{random_string, Id};

use super::{
    DatabaseError, DeleteOutcome, Document, DocumentId, DocumentSnapshot, DocumentStore,
    FieldPath, FieldUpdate, FieldValue, Query, Result, WatchStream,
};

type WatcherId = Id<Watcher>;
type WatchItem = Result<Option<Document>>;

/// An in-memory document store with push subscriptions.
///
/// Cloning is cheap and every clone shares the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    watchers: Vec<Watcher>,
    unreachable: bool,
}

#[derive(Default)]
struct Collection {
    documents: HashMap<DocumentId, Document>,
    /// Ids of deleted documents, so a second delete can be told apart from a bogus one
    tombstones: HashSet<DocumentId>,
}

struct Watcher {
    id: WatcherId,
    collection: String,
    document_id: DocumentId,
    mailbox: Arc<Mutex<Mailbox>>,
}

/// Items waiting to be polled by a [DocumentWatch]
#[derive(Default)]
struct Mailbox {
    items: VecDeque<WatchItem>,
    waker: Option<Waker>,
    closed: bool,
}

/// A push subscription on a single document of a [MemoryStore].
/// When dropped, the subscription is removed from the store.
pub struct DocumentWatch {
    id: WatcherId,
    mailbox: Arc<Mutex<Mailbox>>,
    state: Weak<Mutex<State>>,
}

impl MemoryStore {
    const ID_LENGTH: usize = 20;

    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (or regaining) the connection to the store.
    /// Going unreachable fails every open watch with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        let mut state = self.state.lock();
        state.unreachable = unreachable;

        if !unreachable {
            return;
        }

        warn!("Memory store is now unreachable");

        for watcher in state.watchers.drain(..) {
            let mut mailbox = watcher.mailbox.lock();
            mailbox.push(Err(unreachable_error()));
            mailbox.close();
        }
    }

    /// Returns the number of open watches
    pub fn watcher_count(&self) -> usize {
        self.state.lock().watchers.len()
    }
}

impl State {
    fn ensure_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(unreachable_error());
        }

        Ok(())
    }

    fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }

    /// Delivers a snapshot to every watcher of the document.
    /// A `None` snapshot means the document was deleted and closes the watchers.
    fn notify(&mut self, collection: &str, id: &str, snapshot: Option<Document>) {
        let deleted = snapshot.is_none();
        let is_target = |w: &Watcher| w.collection == collection && w.document_id == id;

        for watcher in self.watchers.iter().filter(|w| is_target(*w)) {
            let mut mailbox = watcher.mailbox.lock();
            mailbox.push(Ok(snapshot.clone()));

            if deleted {
                mailbox.close();
            }
        }

        if deleted {
            self.watchers.retain(|w| !is_target(w));
        }
    }
}

impl Mailbox {
    fn push(&mut self, item: WatchItem) {
        self.items.push_back(item);
        self.wake();
    }

    fn close(&mut self) {
        self.closed = true;
        self.wake();
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake()
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, data: Document) -> Result<DocumentId> {
        if !data.is_object() {
            return Err(DatabaseError::Malformed(
                "documents must be objects".to_string(),
            ));
        }

        let mut state = self.state.lock();
        state.ensure_reachable()?;

        let collection = state.collection_mut(collection);
        let mut id = random_string(Self::ID_LENGTH);

        while collection.documents.contains_key(&id) || collection.tombstones.contains(&id) {
            id = random_string(Self::ID_LENGTH);
        }

        collection.documents.insert(id.clone(), data);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.lock();
        state.ensure_reachable()?;

        Ok(state
            .collections
            .get(collection)
            .and_then(|c| c.documents.get(id))
            .cloned())
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<DocumentSnapshot>> {
        let state = self.state.lock();
        state.ensure_reachable()?;

        let Some(collection) = state.collections.get(collection) else {
            return Ok(vec![]);
        };

        let mut results: Vec<_> = collection
            .documents
            .iter()
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| DocumentSnapshot {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        match &query.order_by_desc {
            Some(path) => {
                results.retain(|s| path.lookup(&s.data).is_some());
                results.sort_by(|a, b| {
                    compare_keys((path.lookup(&b.data), &b.id), (path.lookup(&a.data), &a.id))
                });

                if let Some(cursor) = &query.start_after {
                    results.retain(|s| {
                        compare_keys((path.lookup(&s.data), &s.id), (Some(&cursor.value), &cursor.id))
                            == Ordering::Less
                    });
                }
            }
            None => {
                results.sort_by(|a, b| a.id.cmp(&b.id));

                if let Some(cursor) = &query.start_after {
                    results.retain(|s| s.id > cursor.id);
                }
            }
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn patch(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_reachable()?;

        let snapshot = {
            let document = state
                .collection_mut(collection)
                .documents
                .get_mut(id)
                .ok_or_else(|| DatabaseError::not_found(collection, id))?;

            // Applied to a copy so a bad update leaves the document untouched
            let mut patched = document.clone();

            for update in &updates {
                apply_update(&mut patched, update).map_err(|e| match e {
                    UpdateError::Malformed(path) => {
                        DatabaseError::Malformed(format!("cannot write to {path}"))
                    }
                    UpdateError::MissingParent(path) => DatabaseError::MissingField {
                        collection: collection.to_string(),
                        id: id.to_string(),
                        path,
                    },
                })?;
            }

            *document = patched.clone();
            patched
        };

        debug!(
            "Patched {}:{} ({})",
            collection,
            id,
            updates
                .iter()
                .map(|u| u.path.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        state.notify(collection, id, Some(snapshot));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.ensure_reachable()?;

        let entry = state.collection_mut(collection);

        if entry.documents.remove(id).is_some() {
            entry.tombstones.insert(id.to_string());
            state.notify(collection, id, None);

            return Ok(DeleteOutcome::Deleted);
        }

        if entry.tombstones.contains(id) {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }

        Err(DatabaseError::not_found(collection, id))
    }

    fn watch(&self, collection: &str, id: &str) -> WatchStream {
        let mut state = self.state.lock();

        let watcher_id = WatcherId::new();
        let mailbox: Arc<Mutex<Mailbox>> = Default::default();

        {
            let mut initial = mailbox.lock();

            match state.ensure_reachable() {
                Err(e) => {
                    initial.push(Err(e));
                    initial.close();
                }
                Ok(()) => {
                    let snapshot = state
                        .collections
                        .get(collection)
                        .and_then(|c| c.documents.get(id))
                        .cloned();

                    let exists = snapshot.is_some();
                    initial.push(Ok(snapshot));

                    if exists {
                        state.watchers.push(Watcher {
                            id: watcher_id,
                            collection: collection.to_string(),
                            document_id: id.to_string(),
                            mailbox: mailbox.clone(),
                        });
                    } else {
                        initial.close();
                    }
                }
            }
        }

        DocumentWatch {
            id: watcher_id,
            mailbox,
            state: Arc::downgrade(&self.state),
        }
        .boxed()
    }
}

impl Stream for DocumentWatch {
    type Item = WatchItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut mailbox = self.mailbox.lock();

        if let Some(item) = mailbox.items.pop_front() {
            return Poll::Ready(Some(item));
        }

        if mailbox.closed {
            return Poll::Ready(None);
        }

        mailbox.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for DocumentWatch {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().watchers.retain(|w| w.id != self.id)
        }
    }
}

fn unreachable_error() -> DatabaseError {
    DatabaseError::Transport("memory store is unreachable".to_string())
}

enum UpdateError {
    Malformed(FieldPath),
    MissingParent(FieldPath),
}

/// Writes a single update into a document.
/// [FieldValue::Set] creates intermediate objects as needed, [FieldValue::Update] never does.
fn apply_update(
    document: &mut Value,
    update: &FieldUpdate,
) -> std::result::Result<(), UpdateError> {
    let malformed = || UpdateError::Malformed(update.path.clone());

    let (leaf, parents) = update.path.segments().split_last().ok_or_else(malformed)?;
    let mut current = document;

    match &update.value {
        FieldValue::Set(value) => {
            for segment in parents {
                current = current
                    .as_object_mut()
                    .ok_or_else(malformed)?
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }

            current
                .as_object_mut()
                .ok_or_else(malformed)?
                .insert(leaf.clone(), value.clone());
        }
        FieldValue::Update(value) => {
            for (depth, segment) in parents.iter().enumerate() {
                current = current
                    .as_object_mut()
                    .ok_or_else(malformed)?
                    .get_mut(segment)
                    .ok_or_else(|| {
                        UpdateError::MissingParent(FieldPath::from_segments(&parents[..=depth]))
                    })?;
            }

            current
                .as_object_mut()
                .ok_or_else(malformed)?
                .insert(leaf.clone(), value.clone());
        }
        FieldValue::Delete => {
            for segment in parents {
                current = match current.get_mut(segment) {
                    Some(next) => next,
                    // Nothing to delete
                    None => return Ok(()),
                };
            }

            if let Some(object) = current.as_object_mut() {
                object.remove(leaf);
            }
        }
    }

    Ok(())
}

/// Orders `(field value, id)` pairs. Missing values sort first.
fn compare_keys(a: (Option<&Value>, &DocumentId), b: (Option<&Value>, &DocumentId)) -> Ordering {
    let by_value = match (a.0, b.0) {
        (Some(x), Some(y)) => compare_values(x, y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_value.then_with(|| a.1.cmp(b.1))
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();

            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
