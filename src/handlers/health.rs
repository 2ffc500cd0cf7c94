use axum::{routing::get, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub fn health_routes() -> Router {
    Router::new().route("/api/v1/healthcheck", get(healthcheck))
}

pub async fn healthcheck() -> ApiResponse<Health> {
    ApiResponse::ok(Health { status: "ok" }, "Service is healthy")
}

pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
