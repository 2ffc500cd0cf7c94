use axum::{
    extract::{multipart::Multipart, Extension},
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{AppPath, AppQuery};
use crate::handlers::form::MultipartForm;
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::video::{Video, VideoListQuery, VideoPage};
use crate::response::{ApiResponse, Empty};
use crate::services::videos::{self, PublishStatus, PublishVideo, UpdateVideo};
use crate::AppState;

pub fn video_routes() -> Router {
    Router::new()
        .route("/api/v1/videos", get(list_videos).post(publish_video))
        .route(
            "/api/v1/videos/:video_id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/api/v1/videos/toggle/publish/:video_id", patch(toggle_publish))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

pub async fn list_videos(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppQuery(query): AppQuery<VideoListQuery>,
) -> ApiResult<ApiResponse<VideoPage>> {
    let page = videos::list(&state, user.id, query).await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

pub async fn publish_video(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let mut form = MultipartForm::read(&mut multipart, &state.config.upload_dir, &["videoFile", "thumbnail"]).await?;
    let publish = PublishVideo {
        title: form.text("title"),
        description: form.text("description"),
        duration: form.text("duration"),
        video_file: form.file("videoFile"),
        thumbnail: form.file("thumbnail"),
    };

    let video = videos::publish(&state, user.id, publish).await?;
    Ok(ApiResponse::created(video, "Video published successfully"))
}

pub async fn get_video(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(video_id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<Video>> {
    let video = videos::get(&state, user.id, video_id).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

pub async fn update_video(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(video_id): AppPath<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let mut form = MultipartForm::read(&mut multipart, &state.config.upload_dir, &["thumbnail"]).await?;
    let changes = UpdateVideo {
        title: form.text("title"),
        description: form.text("description"),
        thumbnail: form.file("thumbnail"),
    };

    let video = videos::update(&state, user.id, video_id, changes).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

pub async fn delete_video(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(video_id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<Empty>> {
    videos::delete(&state, user.id, video_id).await?;
    Ok(ApiResponse::ok(Empty::default(), "Video deleted successfully"))
}

pub async fn toggle_publish(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(video_id): AppPath<Uuid>,
) -> ApiResult<ApiResponse<PublishStatus>> {
    let status = videos::toggle_publish(&state, user.id, video_id).await?;
    Ok(ApiResponse::ok(status, "Publish status toggled"))
}
