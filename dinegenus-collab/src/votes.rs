use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;

use crate::{
    now, participant_path, CollabError, CollabResult, DocumentStore, FieldPath, FieldUpdate,
    ParticipantKey, Room, RoomRepository, UserId, VoteStatus, VotingStatus,
};

/// Records votes and drives the voting status of rooms.
pub struct VoteCoordinator<Db> {
    rooms: Arc<RoomRepository<Db>>,
}

/// Aggregate vote progress of a room, always derived from its participants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteProgress {
    pub total: usize,
    pub completed: usize,
    pub all_completed: bool,
    /// Share of completed votes, rounded to two decimals
    pub progress_percent: f64,
}

/// One participant's vote
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantVote {
    pub participant_key: ParticipantKey,
    pub user_id: UserId,
    pub display_name: String,
    pub vote_status: VoteStatus,
    pub vote_data: Option<Value>,
    pub voted_at: Option<DateTime<Utc>>,
}

/// Every vote of a room together with the aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct RoomVotes {
    pub votes: Vec<ParticipantVote>,
    pub progress: VoteProgress,
}

impl<Db> VoteCoordinator<Db>
where
    Db: DocumentStore,
{
    pub fn new(rooms: Arc<RoomRepository<Db>>) -> Self {
        Self { rooms }
    }

    /// Records a participant's vote. Submitting again overwrites the previous vote.
    pub async fn submit_vote(
        &self,
        room_id: &str,
        participant_key: &str,
        vote_data: Value,
    ) -> CollabResult<()> {
        let room = self
            .rooms
            .get_room_by_id(room_id)
            .await?
            .ok_or_else(|| CollabError::room_not_found(room_id))?;

        if !room.is_active() {
            return Err(CollabError::Conflict(format!(
                "room {room_id} is closed, votes are no longer accepted"
            )));
        }

        if !room.participants.contains_key(participant_key) {
            return Err(CollabError::participant_not_found(participant_key));
        }

        // The participant may leave before this write lands, so the entry must still exist
        let path = participant_path(participant_key);
        let updates = vec![
            FieldUpdate::update(path.clone().child("voteData"), vote_data),
            FieldUpdate::update(
                path.clone().child("voteStatus"),
                VoteStatus::Completed.as_str(),
            ),
            FieldUpdate::update(path.child("votedAt"), now().timestamp_millis()),
        ];

        self.rooms.update_fields(room_id, updates).await?;

        info!("Participant {} voted in room {}", participant_key, room_id);
        Ok(())
    }

    /// Sets the voting status from its wire value, rejecting unknown values without writing.
    pub async fn update_voting_status(&self, room_id: &str, status: &str) -> CollabResult<()> {
        let status: VotingStatus = status.parse()?;
        self.set_voting_status(room_id, status).await
    }

    /// Sets the voting status. Any status may follow any other.
    pub async fn set_voting_status(&self, room_id: &str, status: VotingStatus) -> CollabResult<()> {
        self.rooms
            .update_field(room_id, FieldPath::new("votingStatus"), status.as_str())
            .await?;

        info!("Voting in room {} is now {}", room_id, status);
        Ok(())
    }
}

/// Derives the vote progress of a room from its participants.
pub fn compute_vote_status(room: &Room) -> VoteProgress {
    let total = room.participants.len();
    let completed = room
        .participants
        .values()
        .filter(|p| p.vote_status == VoteStatus::Completed)
        .count();

    let progress_percent = if total == 0 {
        0.
    } else {
        (completed as f64 / total as f64 * 10_000.).round() / 100.
    };

    VoteProgress {
        total,
        completed,
        all_completed: total > 0 && completed == total,
        progress_percent,
    }
}

/// Lists every participant's vote in join order, along with the aggregate.
pub fn room_votes(room: &Room) -> RoomVotes {
    let mut entries: Vec<_> = room.participants.iter().collect();
    entries.sort_by(|(ak, a), (bk, b)| a.joined_at.cmp(&b.joined_at).then(ak.cmp(bk)));

    let votes = entries
        .into_iter()
        .map(|(key, p)| ParticipantVote {
            participant_key: key.clone(),
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            vote_status: p.vote_status,
            vote_data: p.vote_data.clone(),
            voted_at: p.voted_at,
        })
        .collect();

    RoomVotes {
        votes,
        progress: compute_vote_status(room),
    }
}
