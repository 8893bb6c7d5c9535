//! All schemas that are exposed from endpoints are defined here
//! along with their [ToSerialized] impls

use dinegenus_collab::{
    JoinOutcome, LeaveOutcome, Location as CollabLocation, Participant as CollabParticipant,
    ParticipantVote as CollabParticipantVote, Room as CollabRoom, RoomPage as CollabRoomPage,
    RoomVotes as CollabRoomVotes, VoteProgress as CollabVoteProgress,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: String,
    room_code: String,
    name: String,
    location: Location,
    owner_id: String,
    /// `active` or `closed`
    status: String,
    /// `waiting`, `active` or `completed`
    voting_status: String,
    /// Milliseconds since the unix epoch
    created_at: i64,
    #[schema(value_type = Option<Object>)]
    recommendations: Option<Value>,
    participants: Vec<Participant>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    address: String,
    name: Option<String>,
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    key: String,
    user_id: String,
    session_id: Option<String>,
    display_name: String,
    is_owner: bool,
    joined_at: i64,
    vote_status: String,
    #[schema(value_type = Option<Object>)]
    vote_data: Option<Value>,
    voted_at: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomPage {
    rooms: Vec<Room>,
    /// Absent on the last page
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResult {
    participant_key: String,
    already_joined: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResult {
    /// `room-deleted`, `left` or `not-joined`
    outcome: String,
    removed: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteProgress {
    total: usize,
    completed: usize,
    all_completed: bool,
    progress_percent: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantVote {
    participant_key: String,
    user_id: String,
    display_name: String,
    vote_status: String,
    #[schema(value_type = Option<Object>)]
    vote_data: Option<Value>,
    voted_at: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomVotes {
    votes: Vec<ParticipantVote>,
    progress: VoteProgress,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Recommendations {
    #[schema(value_type = Object)]
    data: Value,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for CollabRoom {
    fn to_serialized(&self) -> Room {
        let mut participants: Vec<_> = self
            .participants
            .iter()
            .map(|(key, p)| (key, p).to_serialized())
            .collect();

        participants.sort_by_key(|p| p.joined_at);

        Room {
            id: self.id.clone(),
            room_code: self.room_code.clone(),
            name: self.name.clone(),
            location: self.location.to_serialized(),
            owner_id: self.owner_id.clone(),
            status: self.status.as_str().to_string(),
            voting_status: self.voting_status.to_string(),
            created_at: self.created_at.timestamp_millis(),
            recommendations: self.recommendations.clone(),
            participants,
        }
    }
}

impl ToSerialized<Location> for CollabLocation {
    fn to_serialized(&self) -> Location {
        Location {
            address: self.address.clone(),
            name: self.name.clone(),
            lat: self.coordinates.lat,
            lng: self.coordinates.lng,
        }
    }
}

impl ToSerialized<Participant> for (&String, &CollabParticipant) {
    fn to_serialized(&self) -> Participant {
        let (key, p) = self;

        Participant {
            key: key.to_string(),
            user_id: p.user_id.clone(),
            session_id: p.session_id.clone(),
            display_name: p.display_name.clone(),
            is_owner: p.is_owner,
            joined_at: p.joined_at.timestamp_millis(),
            vote_status: p.vote_status.as_str().to_string(),
            vote_data: p.vote_data.clone(),
            voted_at: p.voted_at.map(|t| t.timestamp_millis()),
        }
    }
}

impl ToSerialized<RoomPage> for CollabRoomPage {
    fn to_serialized(&self) -> RoomPage {
        RoomPage {
            rooms: self.rooms.to_serialized(),
            next_cursor: self.next_cursor.as_ref().map(|c| c.to_string()),
        }
    }
}

impl ToSerialized<JoinResult> for JoinOutcome {
    fn to_serialized(&self) -> JoinResult {
        JoinResult {
            participant_key: self.participant_key.clone(),
            already_joined: self.already_joined,
        }
    }
}

impl ToSerialized<LeaveResult> for LeaveOutcome {
    fn to_serialized(&self) -> LeaveResult {
        let (outcome, removed) = match self {
            LeaveOutcome::RoomDeleted => ("room-deleted", vec![]),
            LeaveOutcome::Left { removed } => ("left", removed.clone()),
            LeaveOutcome::NotJoined => ("not-joined", vec![]),
        };

        LeaveResult {
            outcome: outcome.to_string(),
            removed,
        }
    }
}

impl ToSerialized<VoteProgress> for CollabVoteProgress {
    fn to_serialized(&self) -> VoteProgress {
        VoteProgress {
            total: self.total,
            completed: self.completed,
            all_completed: self.all_completed,
            progress_percent: self.progress_percent,
        }
    }
}

impl ToSerialized<ParticipantVote> for CollabParticipantVote {
    fn to_serialized(&self) -> ParticipantVote {
        ParticipantVote {
            participant_key: self.participant_key.clone(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            vote_status: self.vote_status.as_str().to_string(),
            vote_data: self.vote_data.clone(),
            voted_at: self.voted_at.map(|t| t.timestamp_millis()),
        }
    }
}

impl ToSerialized<RoomVotes> for CollabRoomVotes {
    fn to_serialized(&self) -> RoomVotes {
        RoomVotes {
            votes: self.votes.to_serialized(),
            progress: self.progress.to_serialized(),
        }
    }
}

impl ToSerialized<Recommendations> for Value {
    fn to_serialized(&self) -> Recommendations {
        Recommendations { data: self.clone() }
    }
}
