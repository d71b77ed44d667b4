use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::journal::{Action, Journal};
use crate::puzzle::PieceId;

use super::events::{
    ActionHistoryPayload, Audience, ClientEvent, ErrorPayload, LockPayload, PieceLockedPayload,
    RoomMessage, RoomTask, ServerEvent, SessionId, SolvedPayload,
};
use super::queue::SharedRoomQueue;

const LOG_TARGET: &str = "gateway::worker";

struct LockHolder {
    session: SessionId,
    username: String,
}

/// One room's single-threaded authority.
///
/// Tasks arrive through the room queue in submission order. Placement
/// actions are journaled and relayed to everyone but the acting session,
/// locks are arbitrated in memory, and the progress counter decides when
/// the solved announcement goes out.
pub struct RoomWorker {
    room_id: String,
    total_pieces: u32,
    queue: SharedRoomQueue,
    journal: Journal,
    broadcast: broadcast::Sender<RoomMessage>,
    cancel: CancellationToken,
    locks: HashMap<PieceId, LockHolder>,
}

impl RoomWorker {
    pub fn new(
        room_id: impl Into<String>,
        total_pieces: u32,
        queue: SharedRoomQueue,
        journal: Journal,
        broadcast: broadcast::Sender<RoomMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            total_pieces,
            queue,
            journal,
            broadcast,
            cancel,
            locks: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        info!(target = LOG_TARGET, room_id = %self.room_id, "room worker started");
        loop {
            let task = tokio::select! {
                _ = self.cancel.cancelled() => break,
                task = self.queue.pop() => match task {
                    Ok(task) => task,
                    Err(_) => break,
                },
            };
            match task {
                RoomTask::Client {
                    session,
                    username,
                    event,
                } => self.handle_event(session, username, event).await,
                RoomTask::Leave { session } => self.release_locks(session),
            }
        }
        info!(target = LOG_TARGET, room_id = %self.room_id, "room worker stopped");
    }

    async fn handle_event(&mut self, session: SessionId, username: String, event: ClientEvent) {
        match event {
            ClientEvent::CreatePiece(payload) => {
                // scatter positions go to the journal for reconstruction,
                // but are never relayed live
                let action = Action::PieceCreate {
                    id: payload.id,
                    x: payload.x,
                    y: payload.y,
                };
                self.record(session, action, None).await;
            }
            ClientEvent::MovePiece(payload) => {
                let action = Action::PieceMove {
                    id: payload.id,
                    x: payload.x,
                    y: payload.y,
                };
                self.record(session, action, Some(ServerEvent::PieceMoved(payload)))
                    .await;
            }
            ClientEvent::MoveGroup(payload) => {
                let action = Action::GroupMove {
                    id: payload.id,
                    x: payload.x,
                    y: payload.y,
                };
                self.record(session, action, Some(ServerEvent::GroupMoved(payload)))
                    .await;
            }
            ClientEvent::CreateGroup(payload) => {
                let action = Action::GroupCreate {
                    id: payload.id,
                    x: payload.x,
                    y: payload.y,
                };
                self.record(session, action, Some(ServerEvent::GroupCreated(payload)))
                    .await;
            }
            ClientEvent::JoinPiece(payload) => {
                let action = Action::PieceJoinGroup {
                    id: payload.id,
                    x: payload.x,
                    y: payload.y,
                    group: payload.gid,
                };
                self.record(session, action, Some(ServerEvent::PieceJoined(payload)))
                    .await;
            }
            ClientEvent::LockPiece(payload) => self.lock_piece(session, username, payload.id),
            ClientEvent::UnlockPiece(payload) => self.unlock_piece(session, payload.id),
            ClientEvent::Progress(payload) => self.apply_progress(session, payload.progress).await,
            ClientEvent::RequestActions => self.send_history(session).await,
        }
    }

    /// Journals one action, then relays its event to the rest of the room.
    /// The acting session already applied the change locally, so a store
    /// failure is reported back to it alone and nothing is relayed.
    async fn record(&self, session: SessionId, action: Action, relay: Option<ServerEvent>) {
        match self.journal.record(&self.room_id, &action).await {
            Ok(outcome) => {
                if outcome.compacted {
                    debug!(
                        target = LOG_TARGET,
                        room_id = %self.room_id,
                        entry_id = outcome.entry_id,
                        "history compacted"
                    );
                }
                if let Some(event) = relay {
                    self.send(Audience::Exclude(session), event);
                }
            }
            Err(error) => {
                warn!(
                    target = LOG_TARGET,
                    room_id = %self.room_id,
                    error = %error,
                    "failed to record action"
                );
                self.send(
                    Audience::Only(session),
                    ServerEvent::Error(ErrorPayload {
                        message: "action could not be recorded".to_string(),
                    }),
                );
            }
        }
    }

    /// Adds freshly made connections to the room's total. The solved
    /// announcement fires exactly when the total crosses the final
    /// connection count, once per room.
    async fn apply_progress(&self, session: SessionId, by: u32) {
        if by == 0 {
            return;
        }
        let goal = self.total_pieces.saturating_sub(1);
        match self.journal.add_connections(&self.room_id, by).await {
            Ok(total) => {
                let before = total.saturating_sub(by);
                if before < goal && total >= goal {
                    info!(
                        target = LOG_TARGET,
                        room_id = %self.room_id,
                        connections = total,
                        "puzzle solved"
                    );
                    self.send(
                        Audience::Everyone,
                        ServerEvent::PuzzleSolved(SolvedPayload {
                            connections_made: total,
                        }),
                    );
                }
            }
            Err(error) => {
                warn!(
                    target = LOG_TARGET,
                    room_id = %self.room_id,
                    error = %error,
                    "failed to update progress"
                );
                self.send(
                    Audience::Only(session),
                    ServerEvent::Error(ErrorPayload {
                        message: "progress could not be recorded".to_string(),
                    }),
                );
            }
        }
    }

    /// First claim wins; a repeat claim on a held piece is dropped.
    fn lock_piece(&mut self, session: SessionId, username: String, piece: PieceId) {
        if self.locks.contains_key(&piece) {
            return;
        }
        self.locks.insert(
            piece,
            LockHolder {
                session,
                username: username.clone(),
            },
        );
        self.send(
            Audience::Exclude(session),
            ServerEvent::PieceLocked(PieceLockedPayload {
                id: piece,
                username,
            }),
        );
    }

    /// Only the holder can release a lock.
    fn unlock_piece(&mut self, session: SessionId, piece: PieceId) {
        match self.locks.get(&piece) {
            Some(holder) if holder.session == session => {
                self.locks.remove(&piece);
                self.send(
                    Audience::Exclude(session),
                    ServerEvent::PieceUnlocked(LockPayload { id: piece }),
                );
            }
            _ => {}
        }
    }

    /// Frees every lock a departing session still holds.
    fn release_locks(&mut self, session: SessionId) {
        let released: Vec<PieceId> = self
            .locks
            .iter()
            .filter(|(_, holder)| holder.session == session)
            .map(|(&piece, _)| piece)
            .collect();
        for piece in released {
            self.locks.remove(&piece);
            self.send(
                Audience::Everyone,
                ServerEvent::PieceUnlocked(LockPayload { id: piece }),
            );
        }
    }

    async fn send_history(&self, session: SessionId) {
        match self.journal.history(&self.room_id).await {
            Ok(actions) => self.send(
                Audience::Only(session),
                ServerEvent::ResponseActions(ActionHistoryPayload { actions }),
            ),
            Err(error) => {
                warn!(
                    target = LOG_TARGET,
                    room_id = %self.room_id,
                    error = %error,
                    "failed to load action history"
                );
                self.send(
                    Audience::Only(session),
                    ServerEvent::Error(ErrorPayload {
                        message: "action history is unavailable".to_string(),
                    }),
                );
            }
        }
    }

    fn send(&self, audience: Audience, event: ServerEvent) {
        // a send error only means no session is subscribed right now
        let _ = self.broadcast.send(RoomMessage { audience, event });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::gateway::events::{GroupPayload, PiecePayload, ProgressPayload};
    use crate::gateway::queue::FifoRoomQueue;
    use crate::journal::{InMemoryActionLog, InMemorySnapshotStore};

    struct TestRoom {
        queue: SharedRoomQueue,
        journal: Journal,
        broadcast: broadcast::Sender<RoomMessage>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start_room(total_pieces: u32) -> TestRoom {
        let queue: SharedRoomQueue = Arc::new(FifoRoomQueue::new(32));
        let journal = Journal::new(
            Arc::new(InMemoryActionLog::new()),
            Arc::new(InMemorySnapshotStore::new()),
            50,
        );
        let (broadcast, _) = broadcast::channel(32);
        let cancel = CancellationToken::new();
        let worker = RoomWorker::new(
            "room-1",
            total_pieces,
            queue.clone(),
            journal.clone(),
            broadcast.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run());
        TestRoom {
            queue,
            journal,
            broadcast,
            cancel,
            handle,
        }
    }

    fn client_task(session: SessionId, event: ClientEvent) -> RoomTask {
        RoomTask::Client {
            session,
            username: "ada".to_string(),
            event,
        }
    }

    async fn recv(rx: &mut broadcast::Receiver<RoomMessage>) -> RoomMessage {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a room message")
            .expect("broadcast closed")
    }

    #[tokio::test]
    async fn moves_are_journaled_and_relayed_to_others() {
        let room = start_room(16);
        let mut rx = room.broadcast.subscribe();
        let acting = SessionId::new_v4();

        let payload = PiecePayload { id: 4, x: 10, y: 20 };
        room.queue
            .push(client_task(acting, ClientEvent::MovePiece(payload)))
            .unwrap();

        let message = recv(&mut rx).await;
        assert_eq!(message.audience, Audience::Exclude(acting));
        assert_eq!(message.event, ServerEvent::PieceMoved(payload));
        assert_eq!(
            room.journal.history("room-1").await.unwrap(),
            vec!["1,4,10,20".to_string()]
        );

        room.cancel.cancel();
        room.handle.await.unwrap();
    }

    #[tokio::test]
    async fn scatter_actions_are_journaled_but_never_relayed() {
        let room = start_room(16);
        let mut rx = room.broadcast.subscribe();
        let acting = SessionId::new_v4();

        room.queue
            .push(client_task(
                acting,
                ClientEvent::CreatePiece(PiecePayload { id: 0, x: 7, y: 9 }),
            ))
            .unwrap();
        room.queue
            .push(client_task(
                acting,
                ClientEvent::MoveGroup(GroupPayload { id: 1, x: 2, y: 3 }),
            ))
            .unwrap();

        // the first relayed message is already the group move
        let message = recv(&mut rx).await;
        assert_eq!(
            message.event,
            ServerEvent::GroupMoved(GroupPayload { id: 1, x: 2, y: 3 })
        );
        assert_eq!(
            room.journal.history("room-1").await.unwrap(),
            vec!["0,0,7,9".to_string(), "3,1,2,3".to_string()]
        );

        room.cancel.cancel();
        room.handle.await.unwrap();
    }

    #[tokio::test]
    async fn solved_fires_exactly_when_the_total_crosses_the_goal() {
        // 2x2 room: goal is 3 connections
        let room = start_room(4);
        let mut rx = room.broadcast.subscribe();
        let acting = SessionId::new_v4();
        let fence = PiecePayload { id: 0, x: 0, y: 0 };

        room.queue
            .push(client_task(
                acting,
                ClientEvent::Progress(ProgressPayload { progress: 2 }),
            ))
            .unwrap();
        room.queue
            .push(client_task(acting, ClientEvent::MovePiece(fence)))
            .unwrap();
        assert_eq!(recv(&mut rx).await.event, ServerEvent::PieceMoved(fence));

        room.queue
            .push(client_task(
                acting,
                ClientEvent::Progress(ProgressPayload { progress: 1 }),
            ))
            .unwrap();
        let message = recv(&mut rx).await;
        assert_eq!(message.audience, Audience::Everyone);
        assert_eq!(
            message.event,
            ServerEvent::PuzzleSolved(SolvedPayload {
                connections_made: 3
            })
        );

        // more progress after the crossing stays quiet
        room.queue
            .push(client_task(
                acting,
                ClientEvent::Progress(ProgressPayload { progress: 1 }),
            ))
            .unwrap();
        room.queue
            .push(client_task(acting, ClientEvent::MovePiece(fence)))
            .unwrap();
        assert_eq!(recv(&mut rx).await.event, ServerEvent::PieceMoved(fence));
        assert_eq!(room.journal.connections("room-1").await.unwrap(), 4);

        room.cancel.cancel();
        room.handle.await.unwrap();
    }

    #[tokio::test]
    async fn locks_go_to_the_first_claimant_and_die_with_the_session() {
        let room = start_room(16);
        let mut rx = room.broadcast.subscribe();
        let first = SessionId::new_v4();
        let second = SessionId::new_v4();
        let fence = PiecePayload { id: 1, x: 0, y: 0 };

        room.queue
            .push(client_task(first, ClientEvent::LockPiece(LockPayload { id: 7 })))
            .unwrap();
        let message = recv(&mut rx).await;
        assert_eq!(message.audience, Audience::Exclude(first));
        assert_eq!(
            message.event,
            ServerEvent::PieceLocked(PieceLockedPayload {
                id: 7,
                username: "ada".to_string()
            })
        );

        // a contested claim and a non-holder unlock both fall on the floor
        room.queue
            .push(client_task(second, ClientEvent::LockPiece(LockPayload { id: 7 })))
            .unwrap();
        room.queue
            .push(client_task(second, ClientEvent::UnlockPiece(LockPayload { id: 7 })))
            .unwrap();
        room.queue
            .push(client_task(first, ClientEvent::MovePiece(fence)))
            .unwrap();
        assert_eq!(recv(&mut rx).await.event, ServerEvent::PieceMoved(fence));

        room.queue.push(RoomTask::Leave { session: first }).unwrap();
        let message = recv(&mut rx).await;
        assert_eq!(message.audience, Audience::Everyone);
        assert_eq!(
            message.event,
            ServerEvent::PieceUnlocked(LockPayload { id: 7 })
        );

        room.cancel.cancel();
        room.handle.await.unwrap();
    }

    #[tokio::test]
    async fn action_history_goes_only_to_the_requester() {
        let room = start_room(16);
        let mut rx = room.broadcast.subscribe();
        let acting = SessionId::new_v4();
        let requester = SessionId::new_v4();

        room.queue
            .push(client_task(
                acting,
                ClientEvent::CreatePiece(PiecePayload { id: 0, x: 7, y: 9 }),
            ))
            .unwrap();
        room.queue
            .push(client_task(
                acting,
                ClientEvent::MovePiece(PiecePayload { id: 0, x: 11, y: 12 }),
            ))
            .unwrap();
        room.queue
            .push(client_task(requester, ClientEvent::RequestActions))
            .unwrap();

        // skip the move relay, then the history lands addressed to the
        // requester alone
        let _ = recv(&mut rx).await;
        let message = recv(&mut rx).await;
        assert_eq!(message.audience, Audience::Only(requester));
        assert_eq!(
            message.event,
            ServerEvent::ResponseActions(ActionHistoryPayload {
                actions: vec!["0,0,7,9".to_string(), "1,0,11,12".to_string()],
            })
        );

        room.cancel.cancel();
        room.handle.await.unwrap();
    }

    #[tokio::test]
    async fn worker_stops_when_its_queue_closes() {
        let room = start_room(16);
        room.queue.close();
        timeout(Duration::from_secs(1), room.handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
