/// The configuration of the collab system
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// How many codes to draw before giving up on finding an unused room code
    pub max_code_attempts: usize,
    /// Default page size when listing active rooms
    pub active_rooms_page_size: usize,
    /// Default page size when listing a user's voting history
    pub history_page_size: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            // A collision is already unlikely at 36^6 codes, 32 in a row means something is wrong
            max_code_attempts: 32,
            active_rooms_page_size: 10,
            history_page_size: 10,
        }
    }
}
