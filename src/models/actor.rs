use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A connected identity visible on a shared resource channel.
///
/// Actors are ephemeral: the server pushes the full set on every `presence`
/// frame and nothing is persisted on this side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Actor {
    #[serde(rename = "user_id")]
    pub id: String,
    pub initials: String,
    #[serde(rename = "full_name")]
    pub display_name: String,
    pub connected_at: DateTime<Utc>,
}

impl Actor {
    /// True when this entry belongs to the given local user id.
    pub fn is_local(&self, local_id: &str) -> bool {
        self.id == local_id
    }
}
