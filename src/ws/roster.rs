use std::sync::RwLock;

use crate::models::Actor;

/// Roster of actors currently present on the channel.
///
/// Each `presence` snapshot replaces the previous roster wholesale; there is
/// no incremental diffing. The local actor id is resolved once at session
/// construction and used to derive the remote-only view.
pub struct Roster {
    local_id: String,
    actors: RwLock<Vec<Actor>>,
}

impl Roster {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            actors: RwLock::new(Vec::new()),
        }
    }

    /// Replace the roster with a new snapshot.
    pub fn replace(&self, actors: Vec<Actor>) {
        *self.actors.write().unwrap() = actors;
    }

    /// Drop every entry, used when the transport goes away.
    pub fn clear(&self) {
        self.actors.write().unwrap().clear();
    }

    /// Full snapshot, local actor included.
    pub fn all(&self) -> Vec<Actor> {
        self.actors.read().unwrap().clone()
    }

    /// Snapshot excluding the local actor's entry.
    pub fn remote(&self) -> Vec<Actor> {
        self.actors
            .read()
            .unwrap()
            .iter()
            .filter(|a| !a.is_local(&self.local_id))
            .cloned()
            .collect()
    }
}
