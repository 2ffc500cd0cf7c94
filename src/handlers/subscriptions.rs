use axum::{extract::Extension, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::AppPath;
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::response::ApiResponse;
use crate::services::channels;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub channel_id: Uuid,
    pub subscribed: bool,
}

pub fn subscription_routes() -> Router {
    Router::new()
        .route("/api/v1/subscriptions/c/:channel_id", post(toggle_subscription))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

pub async fn toggle_subscription(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(channel_id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionStatus>> {
    let subscribed = channels::toggle_subscription(&state, user.id, channel_id).await?;
    let message = if subscribed { "Subscribed" } else { "Unsubscribed" };
    Ok(ApiResponse::ok(SubscriptionStatus { channel_id, subscribed }, message))
}
