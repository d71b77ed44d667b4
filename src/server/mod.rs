pub mod bootstrap;
pub mod error;
pub mod logging;
pub mod routes;

pub use bootstrap::{run_server, ServerConfig, ServerDeps};
pub use error::ApiError;
pub use routes::{PuzzleSyncServer, ServerContext};
