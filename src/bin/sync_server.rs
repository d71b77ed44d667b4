use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use puzzle_sync::config::{EngineConfig, DEFAULT_BROADCAST_CAPACITY, DEFAULT_SNAPSHOT_THRESHOLD};
use puzzle_sync::gateway::access::{InMemoryRoomDirectory, RoomInfo, Visibility};
use puzzle_sync::journal::store::{InMemoryActionLog, InMemorySnapshotStore};
use puzzle_sync::server::{run_server, ServerConfig, ServerDeps};

const LOG_TARGET: &str = "bin::sync_server";
const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEMO_ROOM_ID: &str = "demo";

#[derive(Debug, Parser)]
#[command(name = "sync_server")]
#[command(about = "Launch the puzzle room sync server", long_about = None)]
struct Args {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "SYNC_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Shared secret used to validate access tokens
    #[arg(long, env = "SYNC_JWT_SECRET")]
    jwt_secret: String,

    /// Actions recorded per room before its history is compacted
    #[arg(long, env = "SYNC_SNAPSHOT_THRESHOLD", default_value_t = DEFAULT_SNAPSHOT_THRESHOLD)]
    snapshot_threshold: u64,

    /// Relay messages buffered per room before slow sessions lag out
    #[arg(long, env = "SYNC_BROADCAST_CAPACITY", default_value_t = DEFAULT_BROADCAST_CAPACITY)]
    broadcast_capacity: usize,

    /// Seed a public demo room so the server can be tried without a room directory
    #[arg(long, env = "SYNC_DEMO_ROOM", default_value_t = false)]
    demo_room: bool,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "SYNC_LOG_JSON", default_value_t = false)]
    json: bool,

    /// Tracing filter directives, overriding RUST_LOG
    #[arg(long, env = "SYNC_LOG_FILTER")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json, args.log_filter.as_deref())?;

    let directory = Arc::new(InMemoryRoomDirectory::new());
    if args.demo_room {
        directory.insert(DEMO_ROOM_ID, demo_room());
        info!(target = LOG_TARGET, room_id = DEMO_ROOM_ID, "seeded demo room");
    }

    let config = ServerConfig {
        bind: args.bind,
        jwt_secret: args.jwt_secret,
        engine: EngineConfig {
            snapshot_threshold: args.snapshot_threshold,
            broadcast_capacity: args.broadcast_capacity,
        },
    };
    let deps = ServerDeps {
        action_log: Arc::new(InMemoryActionLog::new()),
        snapshot_store: Arc::new(InMemorySnapshotStore::new()),
        directory,
    };

    run_server(config, deps).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool, directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn demo_room() -> RoomInfo {
    RoomInfo {
        title: "Demo puzzle".to_owned(),
        owner: "demo".to_owned(),
        visibility: Visibility::Public,
        collaborators: Vec::new(),
        rows: 4,
        columns: 4,
        piece_size: 120,
    }
}
