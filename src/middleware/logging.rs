use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::time::Instant;
use uuid::Uuid;

use crate::error::ApiError;

/// Logs every request with a generated request id, the matched route and
/// the response status.
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let matched_path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %matched_path,
        uri = %uri,
        user_agent = %user_agent,
        "incoming request"
    );

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(request_id = %request_id, method = %method, path = %matched_path, status, duration_ms, "request completed (server error)");
    } else if response.status().is_client_error() {
        tracing::warn!(request_id = %request_id, method = %method, path = %matched_path, status, duration_ms, "request completed (client error)");
    } else {
        tracing::info!(request_id = %request_id, method = %method, path = %matched_path, status, duration_ms, "request completed");
    }

    response
}

/// Turns a handler panic into the standard 500 envelope.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let error_id = Uuid::new_v4();
    ApiError::internal(format!("handler panicked (ID: {}): {}", error_id, detail)).into_response()
}
