//! Client-side presence and editing-awareness for shared Colabri resources.
//!
//! One [`PresenceSession`] per `(resource_type, resource_id)` channel keeps a
//! resilient WebSocket open (heartbeat, exponential-backoff reconnect,
//! race-free teardown), tracks who else is on the resource, and carries
//! best-effort editing signals. The [`AutosaveBatcher`] merges rapid
//! field-level edits into a single debounced write with optimistic-concurrency
//! version tokens.

pub mod autosave;
pub mod config;
pub mod models;
pub mod utils;
pub mod ws;

pub use autosave::{
    AutosaveBatcher, AutosaveBatcherBuilder, DebouncedMerge, PendingChange, SaveErrorCallback,
    SaveFn, SaveFuture, SaveRequest, VersionCallback, VersionUpdate,
};
pub use config::{Config, ConfigError};
pub use models::{
    Actor, ChangeKind, ClientFrame, EventCallback, PresenceEvent, ResourceKey, ServerFrame,
};
pub use ws::{ConnectionState, PresenceSession, PresenceSessionBuilder};
