use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::video::WatchedVideo;
use crate::AppState;

/// Videos the user has watched, oldest first, each with its owner summary.
pub async fn watch_history(state: &AppState, user_id: Uuid) -> ApiResult<Vec<WatchedVideo>> {
    Ok(state.store.watch_history(user_id).await?)
}
