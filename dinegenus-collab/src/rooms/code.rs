use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::{util::random_code, CollabError, CollabResult, DocumentStore};

use super::RoomRepository;

pub const ROOM_CODE_LENGTH: usize = 6;

lazy_static! {
    static ref ROOM_CODE_REGEX: Regex =
        Regex::new(r"^[A-Z0-9]{6}$").expect("room code regex compiles");
}

/// Returns true if the string has the shape of a room code
pub fn is_valid_room_code(code: &str) -> bool {
    ROOM_CODE_REGEX.is_match(code)
}

type CodeSource = Box<dyn Fn() -> String + Send + Sync>;

/// Produces short, human-shareable room codes that are unique among active rooms.
pub struct RoomCodeGenerator {
    max_attempts: usize,
    source: CodeSource,
}

impl RoomCodeGenerator {
    pub fn new(max_attempts: usize) -> Self {
        Self::with_source(max_attempts, || random_code(ROOM_CODE_LENGTH))
    }

    /// Creates a generator that draws candidate codes from `source`
    pub fn with_source<F>(max_attempts: usize, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            source: Box::new(source),
        }
    }

    /// Draws codes until one is not used by an active room.
    ///
    /// The check and the later insert are not atomic, so two rooms created at
    /// the same moment can in principle still end up with the same code.
    pub async fn generate_unique_code<Db>(&self, rooms: &RoomRepository<Db>) -> CollabResult<String>
    where
        Db: DocumentStore,
    {
        for attempt in 1..=self.max_attempts {
            let code = (self.source)();

            if rooms.get_room_by_code(&code).await?.is_none() {
                return Ok(code);
            }

            warn!(
                "Room code {} is taken (attempt {}/{})",
                code, attempt, self.max_attempts
            );
        }

        Err(CollabError::Conflict(format!(
            "room code space exhausted after {} attempts",
            self.max_attempts
        )))
    }
}
