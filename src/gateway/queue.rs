use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot::{Receiver, Sender};

use super::events::RoomTask;

/// Hand-off point between sessions and their room worker. Tasks come out
/// in the order they went in, which is what keeps one client's actions
/// applied in the order that client performed them.
pub trait RoomQueue: Send + Sync {
    fn push(&self, task: RoomTask) -> Result<(), QueueError>;
    fn pop(&self) -> Receiver<RoomTask>;
    fn len(&self) -> usize;
    fn close(&self);
}

pub type SharedRoomQueue = Arc<dyn RoomQueue>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
}

pub struct FifoRoomQueue {
    state: Mutex<QueueState>,
}

struct QueueState {
    items: VecDeque<RoomTask>,
    waiters: VecDeque<Sender<RoomTask>>,
    closed: bool,
}

impl FifoRoomQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                waiters: VecDeque::new(),
                closed: false,
            }),
        }
    }

    fn close_inner(&self) {
        let mut state = self.state.lock().expect("room queue poisoned");
        if state.closed {
            return;
        }
        state.closed = true;
        state.waiters.clear();
        state.items.clear();
    }
}

impl RoomQueue for FifoRoomQueue {
    fn push(&self, task: RoomTask) -> Result<(), QueueError> {
        let mut pending = Some(task);

        loop {
            let waiter = {
                let mut state = self.state.lock().expect("room queue poisoned");
                if state.closed {
                    return Err(QueueError::Closed);
                }
                state.waiters.pop_front()
            };

            if let Some(waiter) = waiter {
                let value = pending.take().expect("task must remain available");
                match waiter.send(value) {
                    Ok(()) => return Ok(()),
                    Err(value) => {
                        pending = Some(value);
                        continue;
                    }
                }
            } else {
                let mut state = self.state.lock().expect("room queue poisoned");
                if state.closed {
                    return Err(QueueError::Closed);
                }
                state
                    .items
                    .push_back(pending.take().expect("task must remain available"));
                return Ok(());
            }
        }
    }

    fn pop(&self) -> Receiver<RoomTask> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        let mut state = self.state.lock().expect("room queue poisoned");
        if state.closed {
            drop(tx);
            return rx;
        }

        if let Some(task) = state.items.pop_front() {
            drop(state);
            if let Err(task) = tx.send(task) {
                let mut state = self.state.lock().expect("room queue poisoned");
                state.items.push_front(task);
            }
        } else {
            state.waiters.push_back(tx);
        }

        rx
    }

    fn len(&self) -> usize {
        let state = self.state.lock().expect("room queue poisoned");
        state.items.len()
    }

    fn close(&self) {
        self.close_inner();
    }
}

impl Drop for FifoRoomQueue {
    fn drop(&mut self) {
        self.close_inner();
    }
}

impl fmt::Debug for FifoRoomQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.lock() {
            Ok(state) => f
                .debug_struct("FifoRoomQueue")
                .field("pending_tasks", &state.items.len())
                .field("waiting_receivers", &state.waiters.len())
                .finish(),
            Err(_) => f
                .debug_struct("FifoRoomQueue")
                .field("poisoned", &true)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Runtime;

    use super::*;
    use crate::gateway::events::{ClientEvent, PiecePayload, SessionId};

    fn sample_task(x: i32) -> RoomTask {
        RoomTask::Client {
            session: SessionId::nil(),
            username: "ada".to_string(),
            event: ClientEvent::MovePiece(PiecePayload { id: 0, x, y: 0 }),
        }
    }

    fn task_x(task: &RoomTask) -> i32 {
        match task {
            RoomTask::Client {
                event: ClientEvent::MovePiece(payload),
                ..
            } => payload.x,
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn fifo_ordering_is_preserved() {
        let queue = FifoRoomQueue::new(8);
        queue.push(sample_task(1)).unwrap();
        queue.push(sample_task(2)).unwrap();
        queue.push(sample_task(3)).unwrap();

        let rt = Runtime::new().unwrap();
        let a = rt.block_on(queue.pop()).unwrap();
        let b = rt.block_on(queue.pop()).unwrap();
        let c = rt.block_on(queue.pop()).unwrap();

        assert_eq!(task_x(&a), 1);
        assert_eq!(task_x(&b), 2);
        assert_eq!(task_x(&c), 3);
    }

    #[test]
    fn pop_before_push_completes_when_a_task_arrives() {
        let queue = FifoRoomQueue::new(4);
        let rx = queue.pop();
        queue.push(sample_task(42)).unwrap();
        let rt = Runtime::new().unwrap();
        let value = rt.block_on(rx).unwrap();
        assert_eq!(task_x(&value), 42);
    }

    #[test]
    fn len_reflects_enqueued_tasks() {
        let queue = FifoRoomQueue::new(2);
        assert_eq!(queue.len(), 0);
        queue.push(sample_task(5)).unwrap();
        assert_eq!(queue.len(), 1);
        let rt = Runtime::new().unwrap();
        let _ = rt.block_on(queue.pop()).unwrap();
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn push_after_close_returns_error() {
        let queue = FifoRoomQueue::new(2);
        queue.close();
        assert!(matches!(queue.push(sample_task(0)), Err(QueueError::Closed)));
    }

    #[test]
    fn pop_after_close_returns_err() {
        let queue = FifoRoomQueue::new(2);
        queue.close();
        let rt = Runtime::new().unwrap();
        assert!(rt.block_on(queue.pop()).is_err());
    }

    #[test]
    fn outstanding_waiters_are_dropped_on_close() {
        let queue = FifoRoomQueue::new(2);
        let rx = queue.pop();
        queue.close();
        let rt = Runtime::new().unwrap();
        assert!(rt.block_on(rx).is_err());
    }
}
