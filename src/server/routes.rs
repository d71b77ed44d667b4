use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::ws::WebSocket;
use axum::extract::{Path, Query, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{middleware, BoxError, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::gateway::access::{RoomInfo, SharedRoomDirectory};
use crate::gateway::auth::{AuthError, Claims, TokenVerifier};
use crate::gateway::registry::RoomRegistry;
use crate::gateway::session::RoomSession;
use crate::journal::Journal;

use super::error::ApiError;
use super::logging::log_requests;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state handed to every handler through the request extensions.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<RoomRegistry>,
    pub journal: Journal,
    pub directory: SharedRoomDirectory,
    pub verifier: TokenVerifier,
    pub shutdown: CancellationToken,
}

pub struct PuzzleSyncServer {
    router: Router,
}

impl PuzzleSyncServer {
    pub fn new(context: Arc<ServerContext>) -> Self {
        // The socket route carries no timeout since sessions live for as
        // long as the client stays in the room.
        let router = Router::new()
            .route("/healthz", get(healthz))
            .route("/rooms/:room_id/socket", get(room_socket))
            .route(
                "/rooms/:room_id/actions",
                get(room_actions).layer(
                    ServiceBuilder::new()
                        .layer(HandleErrorLayer::new(|_: BoxError| async {
                            StatusCode::REQUEST_TIMEOUT
                        }))
                        .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
                ),
            )
            .layer(middleware::from_fn(log_requests))
            .layer(CorsLayer::permissive())
            .layer(Extension(context));

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

#[derive(Debug, Deserialize)]
struct RoomPath {
    room_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActionsResponse {
    actions: Vec<String>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn room_socket(
    Extension(ctx): Extension<Arc<ServerContext>>,
    Path(path): Path<RoomPath>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let (claims, room) = admit(&ctx, &path.room_id, &headers, query.token.as_deref()).await?;
    Ok(ws.on_upgrade(move |socket| attach_session(ctx, path.room_id, claims, room, socket)))
}

async fn room_actions(
    Extension(ctx): Extension<Arc<ServerContext>>,
    Path(path): Path<RoomPath>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<ActionsResponse>, ApiError> {
    admit(&ctx, &path.room_id, &headers, query.token.as_deref()).await?;
    let actions = ctx
        .journal
        .history(&path.room_id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(ActionsResponse { actions }))
}

/// Authenticates the caller and checks that the room admits them. Both
/// routes share this gate so a denied client sees the same status code
/// whether it probed over HTTP or tried to open a socket.
async fn admit(
    ctx: &ServerContext,
    room_id: &str,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<(Claims, RoomInfo), ApiError> {
    let token = bearer_token(headers, query_token)?;
    let claims = ctx.verifier.verify(&token)?;
    let room = ctx.directory.room(room_id).await?;
    if !room.allows(&claims.id) {
        return Err(ApiError::forbidden("not allowed in this room"));
    }
    Ok((claims, room))
}

// Browsers cannot set headers on a websocket handshake, so the token may
// also ride in the query string.
fn bearer_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AuthError> {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match header_token.or(query_token) {
        Some(token) if !token.is_empty() => Ok(token.to_owned()),
        _ => Err(AuthError::MissingToken),
    }
}

/// Runs one admitted socket to completion. Membership is taken inside the
/// upgrade callback so a handshake that never completes cannot leak a
/// member count.
async fn attach_session(
    ctx: Arc<ServerContext>,
    room_id: String,
    claims: Claims,
    room: RoomInfo,
    socket: WebSocket,
) {
    let handle = ctx.registry.join(&room_id, room.total_pieces());
    let session = RoomSession::new(
        claims.username,
        Arc::clone(&handle),
        ctx.journal.clone(),
        ctx.shutdown.child_token(),
    );
    let session_id = session.id();
    session.run(socket).await;
    ctx.registry.leave(&handle, session_id);
}
