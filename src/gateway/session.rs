use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::journal::Journal;

use super::events::{
    ClientEvent, ErrorPayload, PuzzleStatePayload, RoomTask, ServerEvent, SessionId,
};
use super::registry::RoomHandle;

const LOG_TARGET: &str = "gateway::session";

/// One authenticated socket attached to a room.
///
/// The pump forwards room relays out and client events in until the client
/// hangs up, the relay channel lags past recovery or the server shuts
/// down.
pub struct RoomSession {
    id: SessionId,
    username: String,
    handle: Arc<RoomHandle>,
    journal: Journal,
    cancel: CancellationToken,
}

impl RoomSession {
    pub fn new(
        username: impl Into<String>,
        handle: Arc<RoomHandle>,
        journal: Journal,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: SessionId::new_v4(),
            username: username.into(),
            handle,
            journal,
            cancel,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn run(self, socket: WebSocket) {
        info!(
            target = LOG_TARGET,
            session = %self.id,
            username = %self.username,
            room_id = self.handle.room_id(),
            "session attached"
        );
        let (mut sink, mut source) = socket.split();
        let mut relay = BroadcastStream::new(self.handle.subscribe());

        if let Err(err) = self.send_room_state(&mut sink).await {
            warn!(
                target = LOG_TARGET,
                session = %self.id,
                error = %err,
                "failed to send initial room state"
            );
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(target = LOG_TARGET, session = %self.id, "shutdown signal received");
                    break;
                }
                message = relay.next() => {
                    match message {
                        Some(Ok(message)) => {
                            if !message.audience.delivers_to(self.id) {
                                continue;
                            }
                            match serde_json::to_string(&message.event) {
                                Ok(frame) => {
                                    if sink.send(Message::Text(frame)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    warn!(
                                        target = LOG_TARGET,
                                        session = %self.id,
                                        error = %err,
                                        "failed to encode relay event"
                                    );
                                }
                            }
                        }
                        Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                            // past this point the client has missed relays
                            // and cannot be trusted to mirror the room
                            warn!(
                                target = LOG_TARGET,
                                session = %self.id,
                                skipped,
                                "relay lagged, disconnecting"
                            );
                            break;
                        }
                        None => break,
                    }
                }
                frame = source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_frame(&mut sink, &text).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            sink.send(Message::Pong(payload)).await.ok();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(target = LOG_TARGET, session = %self.id, ?frame, "socket closed by client");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(target = LOG_TARGET, session = %self.id, error = %err, "websocket error");
                            break;
                        }
                        None => {
                            debug!(target = LOG_TARGET, session = %self.id, "websocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        let _ = sink.close().await;
        info!(target = LOG_TARGET, session = %self.id, "session detached");
    }

    /// The joining client gets the folded room state before any relays.
    async fn send_room_state(&self, sink: &mut SplitSink<WebSocket, Message>) -> Result<()> {
        let room_id = self.handle.room_id();
        let latest = self
            .journal
            .latest_state(room_id)
            .await
            .context("failed to reconstruct room state")?;
        let connections = self
            .journal
            .connections(room_id)
            .await
            .context("failed to read the progress counter")?;

        let payload = PuzzleStatePayload {
            solved: connections >= self.handle.total_pieces().saturating_sub(1),
            connections_made: connections,
            state: latest.map(|latest| latest.state),
        };
        let frame = serde_json::to_string(&ServerEvent::PuzzleState(payload))
            .context("failed to encode room state")?;
        sink.send(Message::Text(frame))
            .await
            .context("failed to send room state")?;
        Ok(())
    }

    /// Parses one client frame and hands it to the room worker. Returns
    /// `false` once the room is gone and the session should end.
    async fn handle_frame(&self, sink: &mut SplitSink<WebSocket, Message>, text: &str) -> bool {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(err) => {
                debug!(
                    target = LOG_TARGET,
                    session = %self.id,
                    error = %err,
                    "unreadable client frame"
                );
                let reply = ServerEvent::Error(ErrorPayload {
                    message: "unreadable event".to_string(),
                });
                if let Ok(frame) = serde_json::to_string(&reply) {
                    sink.send(Message::Text(frame)).await.ok();
                }
                return true;
            }
        };

        let task = RoomTask::Client {
            session: self.id,
            username: self.username.clone(),
            event,
        };
        if self.handle.submit(task).is_err() {
            warn!(target = LOG_TARGET, session = %self.id, "room queue closed");
            return false;
        }
        true
    }
}
