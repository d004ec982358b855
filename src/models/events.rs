use std::sync::Arc;

use crate::models::{Actor, ChangeKind};

/// Everything a presence session can report to its consumer.
///
/// One exhaustive enum instead of a bag of optional callbacks, so a consumer
/// match is forced to consider every kind of event.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    /// The transport is open and frames are flowing.
    Connected,
    /// The transport dropped. A reconnect may follow unless the close was
    /// terminal; `will_retry` says which.
    Disconnected { reason: String, will_retry: bool },
    /// Full roster snapshot, local actor included.
    RosterChanged { actors: Vec<Actor> },
    /// Another actor changed the underlying data; advisory, prompts a reload.
    DataChanged { actor: Actor, change: ChangeKind },
    /// Another actor started editing a field. Expiry is the consumer's job.
    UserEditing { actor: Actor, field: String },
    /// Another actor stopped editing.
    UserStoppedEditing { actor: Actor },
    /// Server-side error notice. The connection stays open.
    Error { message: String },
}

/// Callback invoked for every [`PresenceEvent`] a session emits.
pub type EventCallback = Arc<dyn Fn(PresenceEvent) + Send + Sync>;
