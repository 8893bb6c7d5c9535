use thiserror::Error;

use crate::DatabaseError;

pub type CollabResult<T> = Result<T, CollabError>;

/// Errors returned by every room, participant, vote and subscription operation.
#[derive(Debug, Clone, Error)]
pub enum CollabError {
    /// Missing or malformed identity, status value, or other input
    #[error("Invalid input: {0}")]
    Validation(String),
    /// A room or participant doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// The operation is not valid for the current room or voting status
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The underlying store was unreachable
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl CollabError {
    pub fn room_not_found(room_id: &str) -> Self {
        Self::NotFound {
            resource: "room",
            identifier: room_id.to_string(),
        }
    }

    pub fn participant_not_found(participant_key: &str) -> Self {
        Self::NotFound {
            resource: "participant",
            identifier: participant_key.to_string(),
        }
    }
}

impl From<DatabaseError> for CollabError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound { collection, id } => Self::NotFound {
                resource: if collection == crate::rooms::ROOMS {
                    "room"
                } else {
                    "document"
                },
                identifier: id,
            },
            DatabaseError::MissingField { path, .. } => match path.segments() {
                [parent, key] if parent == "participants" => Self::participant_not_found(key),
                _ => Self::NotFound {
                    resource: "field",
                    identifier: path.to_string(),
                },
            },
            DatabaseError::Transport(message) => Self::Transport(message),
            e => Self::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CollabError {
    fn from(value: serde_json::Error) -> Self {
        Self::Transport(format!("Malformed document: {value}"))
    }
}
