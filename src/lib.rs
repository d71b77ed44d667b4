pub mod config;
pub mod gateway;
pub mod journal;
pub mod puzzle;
pub mod server;

pub use journal::Journal;
pub use puzzle::{Board, Position, Replay};
