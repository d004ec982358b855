use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::models::{ClientFrame, EditingMessage, PresenceEvent, ServerFrame};
use crate::utils::scope_guard::ScopeGuard;
use crate::ws::policy;
use crate::ws::session::{Command, ConnectionState, SessionShared};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What ended one live connection.
enum CloseOutcome {
    /// Session teardown; exit without reconnecting.
    Teardown,
    /// Terminal close code; exit without reconnecting.
    Terminal(String),
    /// Recoverable loss; reconnect with backoff.
    Retry(String),
}

/// Background task owning the single transport of a presence session.
///
/// Lifecycle:
/// 1. Wait out the settle delay (rapid open/close churn never dials)
/// 2. Connect; on success enter the frame/command/heartbeat loop
/// 3. On recoverable loss, redial with exponential backoff
/// 4. On teardown or a terminal close code, exit for good
pub(crate) async fn connection_task(
    shared: Arc<SessionShared>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    // The connected flag can never survive this task, however it exits.
    let guard_shared = shared.clone();
    let _connected_guard = ScopeGuard::new(move || {
        guard_shared.connected.store(false, Ordering::SeqCst);
    });

    let settle = tokio::time::sleep(shared.connect_delay);
    tokio::pin!(settle);
    loop {
        tokio::select! {
            _ = &mut settle => break,
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Shutdown) | None => {
                    shared.set_state(ConnectionState::Closed);
                    return;
                }
                // Editing signals are connection-bound; nothing is open yet.
                Some(_) => continue,
            },
        }
    }

    let mut attempt: u32 = 0;
    let mut first_dial = true;
    loop {
        if shared.teardown.load(Ordering::SeqCst) {
            shared.set_state(ConnectionState::Closed);
            return;
        }

        shared.set_state(if first_dial {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        debug!(
            "Presence session {} dialing channel {}",
            shared.session_id, shared.key
        );

        match connect_async(shared.url.as_str()).await {
            Ok((stream, _response)) => {
                first_dial = false;
                attempt = 0;
                shared.connected.store(true, Ordering::SeqCst);
                shared.set_state(ConnectionState::Connected);
                info!(
                    "Presence session {} connected to channel {}",
                    shared.session_id, shared.key
                );
                shared.emit(PresenceEvent::Connected);

                let outcome = drive_connection(&shared, stream, &mut cmd_rx).await;

                shared.connected.store(false, Ordering::SeqCst);
                shared.roster.clear();
                shared.emit(PresenceEvent::RosterChanged { actors: Vec::new() });

                match outcome {
                    CloseOutcome::Teardown => {
                        shared.set_state(ConnectionState::Closed);
                        return;
                    }
                    CloseOutcome::Terminal(reason) => {
                        info!(
                            "Presence session {} closed, not reconnecting: {}",
                            shared.session_id, reason
                        );
                        shared.set_state(ConnectionState::Disconnected);
                        shared.emit(PresenceEvent::Disconnected {
                            reason,
                            will_retry: false,
                        });
                        return;
                    }
                    CloseOutcome::Retry(reason) => {
                        shared.set_state(ConnectionState::Reconnecting);
                        shared.emit(PresenceEvent::Disconnected {
                            reason,
                            will_retry: true,
                        });
                    }
                }
            }
            Err(e) => {
                first_dial = false;
                shared.record_error(format!("Connection failed: {}", e));
                warn!(
                    "Presence session {} failed to connect: {}",
                    shared.session_id, e
                );
            }
        }

        // Exponential backoff before the next dial.
        let delay =
            policy::reconnect_delay(attempt, shared.reconnect_base_ms, shared.reconnect_max_ms);
        attempt += 1;
        info!(
            "Presence session {} reconnecting in {:?} (attempt {})",
            shared.session_id, delay, attempt
        );
        let backoff = tokio::time::sleep(delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => {
                        shared.set_state(ConnectionState::Closed);
                        return;
                    }
                    Some(_) => continue,
                },
            }
        }
    }
}

/// Multiplex one live connection: inbound frames, outbound commands and the
/// heartbeat timer.
async fn drive_connection(
    shared: &Arc<SessionShared>,
    mut ws: WsStream,
    cmd_rx: &mut mpsc::Receiver<Command>,
) -> CloseOutcome {
    let mut heartbeat_at = Instant::now() + shared.heartbeat_interval;
    loop {
        let heartbeat = tokio::time::sleep_until(heartbeat_at);
        tokio::pin!(heartbeat);

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Editing { field }) => {
                    if let Err(e) = send_frame(&mut ws, &ClientFrame::Editing(EditingMessage { field })).await {
                        return CloseOutcome::Retry(format!("Failed to send editing signal: {}", e));
                    }
                }
                Some(Command::StoppedEditing) => {
                    if let Err(e) = send_frame(&mut ws, &ClientFrame::StoppedEditing).await {
                        return CloseOutcome::Retry(format!("Failed to send stopped_editing signal: {}", e));
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = ws.close(None).await;
                    return CloseOutcome::Teardown;
                }
            },

            _ = &mut heartbeat => {
                if let Err(e) = send_frame(&mut ws, &ClientFrame::Heartbeat).await {
                    shared.record_error(format!("Heartbeat send failed: {}", e));
                    return CloseOutcome::Retry(format!("Heartbeat send failed: {}", e));
                }
                debug!("Presence session {} heartbeat sent", shared.session_id);
                heartbeat_at = Instant::now() + shared.heartbeat_interval;
            }

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(shared, &text),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(close_frame))) => {
                    let code = close_frame.as_ref().map(|f| u16::from(f.code));
                    let reason = match &close_frame {
                        Some(f) if !f.reason.is_empty() => format!(
                            "Server closed connection: {} (code {})",
                            f.reason.as_str(),
                            u16::from(f.code)
                        ),
                        Some(f) => format!("Server closed connection (code {})", u16::from(f.code)),
                        None => "Server closed connection without status".to_string(),
                    };
                    let teardown = shared.teardown.load(Ordering::SeqCst);
                    if policy::should_reconnect(code, teardown) {
                        return CloseOutcome::Retry(reason);
                    }
                    if teardown {
                        return CloseOutcome::Teardown;
                    }
                    if code == Some(policy::CLOSE_CODE_AUTH_REJECTED) {
                        shared.record_error("Authentication rejected by presence endpoint");
                    }
                    return CloseOutcome::Terminal(reason);
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!(
                        "Presence session {} ignoring unexpected binary frame",
                        shared.session_id
                    );
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    shared.record_error(format!("WebSocket error: {}", e));
                    return CloseOutcome::Retry(format!("WebSocket error: {}", e));
                }
                None => {
                    if shared.teardown.load(Ordering::SeqCst) {
                        return CloseOutcome::Teardown;
                    }
                    return CloseOutcome::Retry("WebSocket stream ended".to_string());
                }
            }
        }
    }
}

/// Parse one inbound frame and dispatch it. Unparseable frames are dropped.
fn handle_frame(shared: &SessionShared, text: &str) {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                "Presence session {} dropping unparseable frame: {}",
                shared.session_id, e
            );
            return;
        }
    };

    match frame {
        ServerFrame::Presence(msg) => {
            shared.roster.replace(msg.users.clone());
            shared.emit(PresenceEvent::RosterChanged { actors: msg.users });
        }
        ServerFrame::DataChanged(msg) => {
            shared.emit(PresenceEvent::DataChanged {
                actor: msg.user,
                change: msg.change_type,
            });
        }
        ServerFrame::UserEditing(msg) => {
            shared.emit(PresenceEvent::UserEditing {
                actor: msg.user,
                field: msg.field,
            });
        }
        ServerFrame::UserStoppedEditing(msg) => {
            shared.emit(PresenceEvent::UserStoppedEditing { actor: msg.user });
        }
        ServerFrame::HeartbeatAck => {
            debug!(
                "Presence session {} heartbeat acknowledged",
                shared.session_id
            );
        }
        ServerFrame::Error(msg) => {
            shared.record_error(msg.message.clone());
            shared.emit(PresenceEvent::Error {
                message: msg.message,
            });
        }
    }
}

async fn send_frame(ws: &mut WsStream, frame: &ClientFrame) -> Result<(), String> {
    let payload = serde_json::to_string(frame)
        .map_err(|e| format!("Failed to serialize frame: {}", e))?;
    ws.send(Message::Text(payload.into()))
        .await
        .map_err(|e| e.to_string())
}
