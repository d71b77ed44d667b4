use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::journal::Journal;

use super::events::{RoomMessage, RoomTask, SessionId};
use super::queue::{FifoRoomQueue, QueueError, SharedRoomQueue};
use super::worker::RoomWorker;

const LOG_TARGET: &str = "gateway::registry";

const ROOM_QUEUE_CAPACITY: usize = 256;

/// Live room state shared by its sessions.
pub struct RoomHandle {
    room_id: String,
    total_pieces: u32,
    queue: SharedRoomQueue,
    broadcast: broadcast::Sender<RoomMessage>,
    members: AtomicUsize,
    cancel: CancellationToken,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn total_pieces(&self) -> u32 {
        self.total_pieces
    }

    pub fn members(&self) -> usize {
        self.members.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomMessage> {
        self.broadcast.subscribe()
    }

    pub fn submit(&self, task: RoomTask) -> Result<(), QueueError> {
        self.queue.push(task)
    }
}

/// Spins rooms up on first join and retires them when the last session
/// leaves. Each room gets its own worker task, queue and broadcast
/// channel.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<RoomHandle>>,
    journal: Journal,
    broadcast_capacity: usize,
    shutdown: CancellationToken,
}

impl RoomRegistry {
    pub fn new(journal: Journal, broadcast_capacity: usize, shutdown: CancellationToken) -> Self {
        Self {
            rooms: DashMap::new(),
            journal,
            broadcast_capacity,
            shutdown,
        }
    }

    /// Attaches a session to a room, starting its worker on first entry.
    pub fn join(&self, room_id: &str, total_pieces: u32) -> Arc<RoomHandle> {
        let handle = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| self.start_room(room_id, total_pieces))
            .clone();
        handle.members.fetch_add(1, Ordering::SeqCst);
        handle
    }

    /// Detaches a session. The worker is told so it can free the session's
    /// locks; the last leave closes the room down.
    pub fn leave(&self, handle: &RoomHandle, session: SessionId) {
        let _ = handle.submit(RoomTask::Leave { session });
        if handle.members.fetch_sub(1, Ordering::SeqCst) == 1 {
            let removed = self
                .rooms
                .remove_if(handle.room_id(), |_, existing| existing.members() == 0);
            if let Some((room_id, handle)) = removed {
                info!(target = LOG_TARGET, room_id = %room_id, "room retired");
                handle.queue.close();
                handle.cancel.cancel();
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn start_room(&self, room_id: &str, total_pieces: u32) -> Arc<RoomHandle> {
        let queue: SharedRoomQueue = Arc::new(FifoRoomQueue::new(ROOM_QUEUE_CAPACITY));
        let (broadcast, _) = broadcast::channel(self.broadcast_capacity);
        let cancel = self.shutdown.child_token();
        let worker = RoomWorker::new(
            room_id,
            total_pieces,
            queue.clone(),
            self.journal.clone(),
            broadcast.clone(),
            cancel.clone(),
        );
        tokio::spawn(worker.run());
        info!(target = LOG_TARGET, room_id, total_pieces, "room started");
        Arc::new(RoomHandle {
            room_id: room_id.to_string(),
            total_pieces,
            queue,
            broadcast,
            members: AtomicUsize::new(0),
            cancel,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::gateway::events::{Audience, ClientEvent, PiecePayload, ServerEvent};
    use crate::journal::{InMemoryActionLog, InMemorySnapshotStore};

    fn registry() -> RoomRegistry {
        let journal = Journal::new(
            Arc::new(InMemoryActionLog::new()),
            Arc::new(InMemorySnapshotStore::new()),
            50,
        );
        RoomRegistry::new(journal, 32, CancellationToken::new())
    }

    #[tokio::test]
    async fn joining_twice_shares_one_room() {
        let registry = registry();
        let first = registry.join("room-1", 4);
        let second = registry.join("room-1", 4);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.members(), 2);
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn rooms_are_kept_apart() {
        let registry = registry();
        let a = registry.join("room-a", 4);
        let b = registry.join("room-b", 9);

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.total_pieces(), 4);
        assert_eq!(b.total_pieces(), 9);
        assert_eq!(registry.room_count(), 2);
    }

    #[tokio::test]
    async fn submitted_tasks_come_back_over_the_broadcast() {
        let registry = registry();
        let session = SessionId::new_v4();
        let handle = registry.join("room-1", 4);
        let mut rx = handle.subscribe();

        let payload = PiecePayload { id: 2, x: 30, y: 40 };
        handle
            .submit(RoomTask::Client {
                session,
                username: "ada".to_string(),
                event: ClientEvent::MovePiece(payload),
            })
            .unwrap();

        let message = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no relay arrived")
            .unwrap();
        assert_eq!(message.audience, Audience::Exclude(session));
        assert_eq!(message.event, ServerEvent::PieceMoved(payload));
    }

    #[tokio::test]
    async fn last_leave_retires_the_room() {
        let registry = registry();
        let first = SessionId::new_v4();
        let second = SessionId::new_v4();

        let handle = registry.join("room-1", 4);
        let same = registry.join("room-1", 4);
        registry.leave(&handle, first);
        assert_eq!(registry.room_count(), 1);

        registry.leave(&same, second);
        assert_eq!(registry.room_count(), 0);
        assert!(handle
            .submit(RoomTask::Leave {
                session: SessionId::new_v4()
            })
            .is_err());

        // a fresh join builds the room anew
        let again = registry.join("room-1", 4);
        assert!(!Arc::ptr_eq(&handle, &again));
        assert_eq!(registry.room_count(), 1);
    }
}
