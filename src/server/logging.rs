use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{debug, info};

const LOG_TARGET: &str = "server::http";

/// Middleware that logs every HTTP request with its status and timing.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path();

    match uri.query() {
        Some(query) => debug!(target = LOG_TARGET, %method, %path, %query, "request received"),
        None => debug!(target = LOG_TARGET, %method, %path, "request received"),
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status();

    info!(
        target = LOG_TARGET,
        %method,
        %path,
        status = %status.as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "request completed"
    );

    response
}
