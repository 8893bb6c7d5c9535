use std::fmt::Display;

use serde_json::Value;

/// The type used for document ids. Ids are assigned by the store.
pub type DocumentId = String;

/// A schemaless document, always a JSON object at the top level.
pub type Document = Value;

/// A document together with its id, as returned by queries
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub data: Document,
}

/// A dotted path into a document, for example `participants.<key>.voteStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(field: impl Into<String>) -> Self {
        Self(vec![field.into()])
    }

    /// Parses a dotted path. Returns `None` if any segment is empty.
    pub fn parse(dotted: &str) -> Option<Self> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();

        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        Some(Self(segments))
    }

    pub(crate) fn from_segments(segments: &[String]) -> Self {
        Self(segments.to_vec())
    }

    /// Returns a new path with `segment` appended
    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Resolves the path against a document
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(document, |current, segment| current.get(segment))
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// What a targeted update does to its field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(Value),
    /// Like [FieldValue::Set], but every parent object must already exist
    Update(Value),
    /// Removes the field, if it exists
    Delete,
}

/// A write to a single field path, leaving the rest of the document untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: FieldPath,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn set(path: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: FieldValue::Set(value.into()),
        }
    }

    pub fn update(path: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: FieldValue::Update(value.into()),
        }
    }

    pub fn delete(path: FieldPath) -> Self {
        Self {
            path,
            value: FieldValue::Delete,
        }
    }
}

/// Position to resume a descending query after.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCursor {
    /// The value of the ordering field of the last returned document
    pub value: Value,
    pub id: DocumentId,
}

/// A predicate query over a collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Equality filters, all of which must match
    pub filters: Vec<(FieldPath, Value)>,
    /// Documents missing this field are excluded when set
    pub order_by_desc: Option<FieldPath>,
    pub start_after: Option<QueryCursor>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, path: FieldPath, value: impl Into<Value>) -> Self {
        self.filters.push((path, value.into()));
        self
    }

    pub fn order_by_desc(mut self, path: FieldPath) -> Self {
        self.order_by_desc = Some(path);
        self
    }

    pub fn start_after(mut self, cursor: Option<QueryCursor>) -> Self {
        self.start_after = cursor;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the document satisfies every filter
    pub fn matches(&self, document: &Value) -> bool {
        self.filters
            .iter()
            .all(|(path, expected)| path.lookup(document) == Some(expected))
    }
}

/// The result of deleting a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The document existed once, but was already deleted
    AlreadyDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_path_parsing() {
        let path = FieldPath::parse("participants.abc.voteStatus").expect("path parses");

        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "participants.abc.voteStatus");
        assert_eq!(
            FieldPath::new("participants").child("abc").child("voteStatus"),
            path
        );

        assert!(FieldPath::parse("participants..voteStatus").is_none());
        assert!(FieldPath::parse("").is_none());
    }

    #[test]
    fn test_lookup_and_filters() {
        let document = json!({
            "status": "active",
            "participants": { "abc": { "voteStatus": "pending" } }
        });

        let path = FieldPath::parse("participants.abc.voteStatus").unwrap();
        assert_eq!(path.lookup(&document), Some(&json!("pending")));
        assert_eq!(FieldPath::new("missing").lookup(&document), None);

        let query = Query::new().filter(FieldPath::new("status"), "active");
        assert!(query.matches(&document));

        let query = query.filter(path, "completed");
        assert!(!query.matches(&document));
    }
}
