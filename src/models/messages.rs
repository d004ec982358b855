use serde::{Deserialize, Serialize};
use crate::models::Actor;

/// Full roster snapshot. Replaces any previously known roster wholesale.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PresenceMessage {
    pub users: Vec<Actor>,
}

/// Kind of change another actor applied to the shared resource.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// Advisory notice that another actor changed the underlying data.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DataChangedMessage {
    pub user: Actor,
    pub change_type: ChangeKind,
}

/// Another actor started editing a field. The indicator is not expired
/// here; callers apply their own timeout.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserEditingMessage {
    pub user: Actor,
    pub field: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserStoppedEditingMessage {
    pub user: Actor,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EditingMessage {
    pub field: String,
}

/// Frames received from the server on the presence channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "presence")]
    Presence(PresenceMessage),
    #[serde(rename = "data_changed")]
    DataChanged(DataChangedMessage),
    #[serde(rename = "user_editing")]
    UserEditing(UserEditingMessage),
    #[serde(rename = "user_stopped_editing")]
    UserStoppedEditing(UserStoppedEditingMessage),
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck,
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

/// Frames sent to the server on the presence channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "editing")]
    Editing(EditingMessage),
    #[serde(rename = "stopped_editing")]
    StoppedEditing,
}
