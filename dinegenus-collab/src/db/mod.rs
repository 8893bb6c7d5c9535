use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// A live stream of full-document snapshots.
/// Yields `Ok(None)` once when the document is deleted, then ends.
/// A transport failure is yielded as an error item, after which the stream ends.
pub type WatchStream = BoxStream<'static, Result<Option<Document>>>;

#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// The store could not be reached
    #[error("Store is unreachable: {0}")]
    Transport(String),
    /// A document doesn't exist
    #[error("{collection}:{id} doesn't exist")]
    NotFound { collection: String, id: DocumentId },
    /// An update required a parent object the document doesn't have
    #[error("{collection}:{id} has no {path}")]
    MissingField {
        collection: String,
        id: DocumentId,
        path: FieldPath,
    },
    /// A document or an update did not have the expected shape
    #[error("Malformed document: {0}")]
    Malformed(String),
}

impl DatabaseError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Represents a document store with push subscriptions.
///
/// Writes are targeted: [DocumentStore::patch] merges individual field paths into
/// the stored document, so concurrent writes to unrelated paths never clobber each other.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Inserts a new document and returns its store-assigned id.
    async fn insert(&self, collection: &str, data: Document) -> Result<DocumentId>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    async fn query(&self, collection: &str, query: Query) -> Result<Vec<DocumentSnapshot>>;
    /// Applies the updates in order as one write. Nothing is written when any update fails.
    ///
    /// Fails with [DatabaseError::NotFound] if the document is gone, and with
    /// [DatabaseError::MissingField] if a [FieldValue::Update] has no parent to write into.
    async fn patch(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<()>;
    /// Deleting an already deleted document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<DeleteOutcome>;
    /// Opens a push subscription. The current snapshot is always the first item.
    fn watch(&self, collection: &str, id: &str) -> WatchStream;
}
