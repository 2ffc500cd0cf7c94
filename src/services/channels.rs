use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::user::ChannelProfile;
use crate::AppState;

pub async fn channel_profile(state: &AppState, viewer: Uuid, username: &str) -> ApiResult<ChannelProfile> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is missing"));
    }

    state
        .store
        .channel_profile(&username.to_lowercase(), viewer)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))
}

/// Subscribes `subscriber` to `channel_id`, or unsubscribes if already
/// subscribed. Returns the new state.
pub async fn toggle_subscription(state: &AppState, subscriber: Uuid, channel_id: Uuid) -> ApiResult<bool> {
    if subscriber == channel_id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }
    if state.store.find_user_by_id(channel_id).await?.is_none() {
        return Err(ApiError::not_found("Channel does not exist"));
    }

    let subscribed = state.store.toggle_subscription(subscriber, channel_id).await?;
    tracing::info!(subscriber = %subscriber, channel = %channel_id, subscribed, "subscription toggled");
    Ok(subscribed)
}
