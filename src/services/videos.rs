// src/services/videos.rs
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::media::{MediaKind, TempUpload};
use crate::models::video::{
    NewVideo, SortField, Video, VideoChanges, VideoFilter, VideoListQuery, VideoPage, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
use crate::services::{require_kind, trimmed};
use crate::AppState;

/// Fields collected from the publish form.
#[derive(Default)]
pub struct PublishVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub video_file: Option<TempUpload>,
    pub thumbnail: Option<TempUpload>,
}

#[derive(Default)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<TempUpload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatus {
    pub video_id: Uuid,
    pub is_published: bool,
}

pub async fn publish(state: &AppState, owner: Uuid, form: PublishVideo) -> ApiResult<Video> {
    let (Some(title), Some(description)) = (trimmed(form.title), trimmed(form.description)) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };
    let duration = trimmed(form.duration)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ApiError::bad_request("Duration must be a positive number of seconds"))?;

    let video_file = form
        .video_file
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    require_kind(&video_file, MediaKind::Video, "Video file must be a video")?;
    if let Some(thumbnail) = &form.thumbnail {
        require_kind(thumbnail, MediaKind::Image, "Thumbnail must be an image")?;
    }

    let video_asset = state
        .media
        .upload(video_file, MediaKind::Video)
        .await
        .ok_or_else(|| ApiError::bad_request("Error while uploading video"))?;
    let thumbnail = state.media.upload_optional(form.thumbnail, MediaKind::Image).await;

    let new_video = NewVideo {
        title,
        description,
        duration,
        video_file: video_asset.clone(),
        thumbnail: thumbnail.clone(),
        owner_id: owner,
    };

    match state.store.create_video(new_video).await {
        Ok(video) => {
            tracing::info!(video_id = %video.id, owner = %owner, "video published");
            Ok(video)
        }
        Err(e) => {
            let mut assets = vec![video_asset];
            assets.extend(thumbnail);
            state.media.delete_later(assets);
            Err(e.into())
        }
    }
}

/// Normalizes listing parameters: page starts at 1, limit is clamped to
/// `1..=MAX_PAGE_SIZE`, newest first by default.
pub fn build_filter(viewer: Uuid, query: VideoListQuery) -> ApiResult<VideoFilter> {
    let sort = match trimmed(query.sort_by) {
        Some(raw) => SortField::parse(&raw).ok_or_else(|| {
            ApiError::bad_request("sortBy must be one of createdAt, title, duration, views")
        })?,
        None => SortField::CreatedAt,
    };

    let descending = match trimmed(query.sort_type).map(|s| s.to_lowercase()).as_deref() {
        None | Some("desc") => true,
        Some("asc") => false,
        Some(_) => return Err(ApiError::bad_request("sortType must be asc or desc")),
    };

    Ok(VideoFilter {
        viewer,
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        search: trimmed(query.query),
        owner: query.user_id,
        sort,
        descending,
    })
}

pub async fn list(state: &AppState, viewer: Uuid, query: VideoListQuery) -> ApiResult<VideoPage> {
    let filter = build_filter(viewer, query)?;
    Ok(state.store.list_videos(&filter).await?)
}

/// Fetches a video and counts the view. Unpublished videos are only visible
/// to their owner; everyone else gets a 404.
pub async fn get(state: &AppState, viewer: Uuid, video_id: Uuid) -> ApiResult<Video> {
    let mut video = state
        .store
        .find_video(video_id)
        .await?
        .filter(|v| v.visible_to(viewer))
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    state.store.record_view(viewer, video.id).await?;
    video.views += 1;
    Ok(video)
}

pub async fn update(state: &AppState, user_id: Uuid, video_id: Uuid, form: UpdateVideo) -> ApiResult<Video> {
    let title = trimmed(form.title);
    let description = trimmed(form.description);
    if title.is_none() && description.is_none() && form.thumbnail.is_none() {
        return Err(ApiError::bad_request(
            "Provide a title, description or thumbnail to update",
        ));
    }
    if let Some(thumbnail) = &form.thumbnail {
        require_kind(thumbnail, MediaKind::Image, "Thumbnail must be an image")?;
    }

    let existing = owned_video(state, user_id, video_id).await?;

    let thumbnail = match form.thumbnail {
        Some(file) => Some(
            state
                .media
                .upload(file, MediaKind::Image)
                .await
                .ok_or_else(|| ApiError::bad_request("Error while uploading thumbnail"))?,
        ),
        None => None,
    };

    let changes = VideoChanges {
        title,
        description,
        thumbnail: thumbnail.clone(),
    };

    let updated = match state.store.update_video(video_id, changes).await {
        Ok(Some(video)) => video,
        Ok(None) => {
            state.media.delete_later(thumbnail.into_iter().collect());
            return Err(ApiError::not_found("Video not found"));
        }
        Err(e) => {
            state.media.delete_later(thumbnail.into_iter().collect());
            return Err(e.into());
        }
    };

    if thumbnail.is_some() {
        state.media.delete_later(existing.thumbnail_asset().into_iter().collect());
    }
    Ok(updated)
}

pub async fn delete(state: &AppState, user_id: Uuid, video_id: Uuid) -> ApiResult<()> {
    owned_video(state, user_id, video_id).await?;

    let removed = state
        .store
        .delete_video(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    state.media.delete_later(removed.assets());
    tracing::info!(video_id = %video_id, "video deleted");
    Ok(())
}

pub async fn toggle_publish(state: &AppState, user_id: Uuid, video_id: Uuid) -> ApiResult<PublishStatus> {
    owned_video(state, user_id, video_id).await?;

    let video = state
        .store
        .toggle_publish(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(PublishStatus {
        video_id: video.id,
        is_published: video.is_published,
    })
}

async fn owned_video(state: &AppState, user_id: Uuid, video_id: Uuid) -> ApiResult<Video> {
    let video = state
        .store
        .find_video(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if video.owner_id != user_id {
        return Err(ApiError::Forbidden(
            "You are not allowed to modify this video".to_string(),
        ));
    }
    Ok(video)
}
