use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::gateway::access::SharedRoomDirectory;
use crate::gateway::auth::TokenVerifier;
use crate::gateway::registry::RoomRegistry;
use crate::journal::store::{SharedActionLog, SharedSnapshotStore};
use crate::journal::Journal;

use super::routes::{PuzzleSyncServer, ServerContext};

const LOG_TARGET: &str = "server::bootstrap";

pub struct ServerConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub engine: EngineConfig,
}

/// Storage and directory backends the server runs against.
pub struct ServerDeps {
    pub action_log: SharedActionLog,
    pub snapshot_store: SharedSnapshotStore,
    pub directory: SharedRoomDirectory,
}

pub async fn run_server(config: ServerConfig, deps: ServerDeps) -> Result<()> {
    let shutdown = CancellationToken::new();
    let journal = Journal::new(
        deps.action_log,
        deps.snapshot_store,
        config.engine.snapshot_threshold,
    );
    let registry = Arc::new(RoomRegistry::new(
        journal.clone(),
        config.engine.broadcast_capacity,
        shutdown.clone(),
    ));

    let context = Arc::new(ServerContext {
        registry,
        journal,
        directory: deps.directory,
        verifier: TokenVerifier::new(&config.jwt_secret),
        shutdown: shutdown.clone(),
    });

    let server = PuzzleSyncServer::new(context);
    let make_service = server.into_router().into_make_service();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;
    info!(
        target = LOG_TARGET,
        %local_addr,
        "puzzle sync server listening"
    );

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    shutdown.cancel();
    info!(target = LOG_TARGET, "room workers signalled to stop");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = LOG_TARGET,
            error = %err,
            "failed to install ctrl-c handler"
        );
    }
    info!(target = LOG_TARGET, "shutdown signal received");
}
