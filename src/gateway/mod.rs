pub mod access;
pub mod auth;
pub mod events;
pub mod queue;
pub mod registry;
pub mod session;
pub mod worker;

pub use access::{
    AccessError, InMemoryRoomDirectory, RoomDirectory, RoomInfo, SharedRoomDirectory, Visibility,
};
pub use auth::{AuthError, Claims, TokenVerifier};
pub use events::{Audience, ClientEvent, RoomMessage, RoomTask, ServerEvent, SessionId};
pub use queue::{FifoRoomQueue, QueueError, RoomQueue, SharedRoomQueue};
pub use registry::{RoomHandle, RoomRegistry};
pub use session::RoomSession;
pub use worker::RoomWorker;
