use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Actor, EventCallback, PresenceEvent, ResourceKey};
use crate::ws::roster::Roster;

/// Lifecycle of the streaming connection. `Closed` is terminal for a
/// session instance; a new session must be opened to connect again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Commands sent from the public API to the background connection task.
pub(crate) enum Command {
    Editing { field: String },
    StoppedEditing,
    Shutdown,
}

/// State shared between the [`PresenceSession`] handle and its connection task.
pub(crate) struct SessionShared {
    pub key: ResourceKey,
    pub url: String,
    pub session_id: Uuid,
    pub connect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    /// Cleared on teardown; every callback checks it before touching state.
    pub live: AtomicBool,
    /// Set by `close()` before the transport is torn down.
    pub teardown: AtomicBool,
    pub connected: AtomicBool,
    pub state: RwLock<ConnectionState>,
    pub last_error: RwLock<Option<String>>,
    pub roster: Roster,
    pub on_event: Option<EventCallback>,
}

impl SessionShared {
    pub fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().unwrap();
        // Closed is terminal
        if *state == ConnectionState::Closed {
            return;
        }
        *state = next;
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("Session {} error recorded: {}", self.session_id, message);
        *self.last_error.write().unwrap() = Some(message);
    }

    /// Dispatch an event to the consumer, unless the session was disposed.
    pub fn emit(&self, event: PresenceEvent) {
        if !self.live.load(Ordering::SeqCst) {
            return;
        }
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

/// Builder for a [`PresenceSession`].
pub struct PresenceSessionBuilder {
    key: ResourceKey,
    local_user_id: String,
    auth_token: String,
    config: Config,
    on_event: Option<EventCallback>,
}

impl PresenceSessionBuilder {
    /// Register the callback invoked for every [`PresenceEvent`].
    pub fn on_event(mut self, f: impl Fn(PresenceEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    /// Override the default configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Spawn the connection task and return the session handle.
    ///
    /// The first connect attempt is scheduled after a short fixed delay so
    /// rapid open/close churn never dials the server. Must be called from
    /// within a tokio runtime.
    pub fn open(self) -> PresenceSession {
        let session_id = Uuid::new_v4();
        let url = format!(
            "{}/presence/{}?token={}",
            self.config.ws_base_url.trim_end_matches('/'),
            self.key.channel_path(),
            self.auth_token,
        );

        info!(
            "Opening presence session {} for channel {}",
            session_id, self.key
        );

        let shared = Arc::new(SessionShared {
            key: self.key,
            url,
            session_id,
            connect_delay: Duration::from_millis(self.config.connect_delay_ms),
            heartbeat_interval: Duration::from_secs(self.config.heartbeat_interval_secs),
            reconnect_base_ms: self.config.reconnect_base_delay_ms,
            reconnect_max_ms: self.config.reconnect_max_delay_ms,
            live: AtomicBool::new(true),
            teardown: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            state: RwLock::new(ConnectionState::Disconnected),
            last_error: RwLock::new(None),
            roster: Roster::new(self.local_user_id),
            on_event: self.on_event,
        });

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
        let task_shared = shared.clone();
        let task = tokio::spawn(async move {
            crate::ws::conn::connection_task(task_shared, cmd_rx).await;
        });

        PresenceSession {
            shared,
            cmd_tx,
            task,
        }
    }
}

/// Handle to one presence channel.
///
/// Owns the single streaming connection for its resource key and exposes the
/// roster, the editing notifier, and connection state. Dropping the handle
/// tears the session down.
pub struct PresenceSession {
    shared: Arc<SessionShared>,
    cmd_tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl PresenceSession {
    /// Start building a session for the given channel.
    ///
    /// `local_user_id` is the authenticated identity used to filter the
    /// remote roster; `auth_token` is carried as a connection parameter.
    pub fn builder(
        key: ResourceKey,
        local_user_id: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> PresenceSessionBuilder {
        PresenceSessionBuilder {
            key,
            local_user_id: local_user_id.into(),
            auth_token: auth_token.into(),
            config: Config::default(),
            on_event: None,
        }
    }

    /// Signal that the local user is editing a field.
    ///
    /// Best-effort: sent only while connected, dropped silently otherwise.
    pub fn editing(&self, field: impl Into<String>) {
        if !self.is_connected() {
            return;
        }
        let _ = self.cmd_tx.try_send(Command::Editing {
            field: field.into(),
        });
    }

    /// Signal that the local user stopped editing. Best-effort, like
    /// [`editing`](Self::editing).
    pub fn stopped_editing(&self) {
        if !self.is_connected() {
            return;
        }
        let _ = self.cmd_tx.try_send(Command::StoppedEditing);
    }

    /// Full roster snapshot, local actor included.
    pub fn roster(&self) -> Vec<Actor> {
        self.shared.roster.all()
    }

    /// Roster snapshot excluding the local actor.
    pub fn remote_roster(&self) -> Vec<Actor> {
        self.shared.roster.remote()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Most recent transport or server error, if any. Never fatal.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.read().unwrap().clone()
    }

    /// Tear the session down: cancel every timer, close the transport and
    /// guarantee that no reconnect is ever scheduled afterwards. Idempotent.
    pub fn close(&self) {
        if self.shared.teardown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing presence session {}", self.shared.session_id);
        self.shared.live.store(false, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Closed);
        if self.cmd_tx.try_send(Command::Shutdown).is_err() {
            // Task is gone or the channel is saturated; stop it outright.
            self.task.abort();
        }
    }
}

impl Drop for PresenceSession {
    fn drop(&mut self) {
        self.close();
    }
}
