use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CollabError, CollabResult, Document, DocumentId};

pub type RoomId = DocumentId;
/// Identifies one membership record within a room, unlike [UserId] which identifies a person.
pub type ParticipantKey = String;
pub type UserId = String;

/// A decision room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Assigned by the store, not part of the document
    #[serde(skip)]
    pub id: RoomId,
    pub room_code: String,
    pub name: String,
    pub location: Location,
    pub owner_id: UserId,
    pub status: RoomStatus,
    pub voting_status: VotingStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Written by the recommendation service, never by this crate
    #[serde(default)]
    pub recommendations: Option<Value>,
    #[serde(default)]
    pub participants: BTreeMap<ParticipantKey, Participant>,
}

/// A user's membership record in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    /// Distinguishes concurrent sessions of the same user
    #[serde(default)]
    pub session_id: Option<String>,
    pub display_name: String,
    pub is_owner: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
    pub vote_status: VoteStatus,
    #[serde(default)]
    pub vote_data: Option<Value>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub voted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingStatus {
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Pending,
    Completed,
}

/// A verified identity, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub session_id: Option<String>,
}

/// What the owner supplies when creating a room
#[derive(Debug, Clone)]
pub struct RoomMetadata {
    pub name: String,
    pub location: Location,
    /// The owner's display name in the room
    pub display_name: String,
}

/// The current time at the millisecond precision documents store
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

impl Room {
    /// Reads a room out of its stored document
    pub fn from_document(id: &str, document: Document) -> CollabResult<Self> {
        let mut room: Room = serde_json::from_value(document)?;
        room.id = id.to_string();

        Ok(room)
    }

    pub fn to_document(&self) -> CollabResult<Document> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn owner(&self) -> Option<(&ParticipantKey, &Participant)> {
        self.participants.iter().find(|(_, p)| p.is_owner)
    }

    pub fn is_active(&self) -> bool {
        self.status == RoomStatus::Active
    }

    /// Returns true if the user has a participant entry in this room
    pub fn has_user(&self, user_id: &str) -> bool {
        self.participants.values().any(|p| p.user_id == user_id)
    }
}

impl Participant {
    pub fn new(identity: &Identity, display_name: &str, is_owner: bool) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            session_id: identity.session_id.clone(),
            display_name: display_name.trim().to_string(),
            is_owner,
            joined_at: now(),
            vote_status: VoteStatus::Pending,
            vote_data: None,
            voted_at: None,
        }
    }

    /// Returns true if this entry belongs to exactly this user and session
    pub fn matches_session(&self, identity: &Identity) -> bool {
        self.user_id == identity.user_id && self.session_id == identity.session_id
    }
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn validate(&self) -> CollabResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(CollabError::Validation("user id must not be empty".to_string()));
        }

        if matches!(&self.session_id, Some(s) if s.trim().is_empty()) {
            return Err(CollabError::Validation(
                "session id must not be empty when supplied".to_string(),
            ));
        }

        Ok(())
    }
}

impl VotingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl Display for VotingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingStatus {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(CollabError::Validation(format!(
                "{other:?} is not a voting status"
            ))),
        }
    }
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl VoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_shape() {
        let owner = Identity::new("user-1").with_session("tab-1");
        let mut participants = BTreeMap::new();
        participants.insert("k1".to_string(), Participant::new(&owner, " Ada ", true));

        let room = Room {
            id: "ignored".to_string(),
            room_code: "AB12CD".to_string(),
            name: "Friday lunch".to_string(),
            location: Location {
                address: "1 Main St".to_string(),
                name: None,
                coordinates: Coordinates { lat: 25.03, lng: 121.56 },
            },
            owner_id: "user-1".to_string(),
            status: RoomStatus::Active,
            voting_status: VotingStatus::Waiting,
            created_at: Utc::now(),
            recommendations: None,
            participants,
        };

        let document = room.to_document().unwrap();

        assert!(document.get("id").is_none());
        assert_eq!(document["roomCode"], json!("AB12CD"));
        assert_eq!(document["votingStatus"], json!("waiting"));
        assert_eq!(document["participants"]["k1"]["voteStatus"], json!("pending"));
        assert_eq!(document["participants"]["k1"]["displayName"], json!("Ada"));
        assert!(document["createdAt"].is_i64());

        let restored = Room::from_document("room-1", document).unwrap();
        assert_eq!(restored.id, "room-1");
        assert_eq!(restored.owner().map(|(k, _)| k.as_str()), Some("k1"));
    }

    #[test]
    fn test_voting_status_parsing() {
        assert_eq!("active".parse::<VotingStatus>().unwrap(), VotingStatus::Active);
        assert_eq!(VotingStatus::Completed.to_string(), "completed");
        assert!(matches!(
            "finished".parse::<VotingStatus>(),
            Err(CollabError::Validation(_))
        ));
    }

    #[test]
    fn test_identity_validation() {
        assert!(Identity::new("user-1").validate().is_ok());
        assert!(Identity::new("  ").validate().is_err());
        assert!(Identity::new("user-1").with_session("").validate().is_err());
    }
}
