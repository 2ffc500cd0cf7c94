use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::media::MediaAsset;
use crate::models::user::OwnerSummary;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    #[serde(skip_serializing)]
    pub video_public_id: String,
    pub thumbnail: Option<String>,
    #[serde(skip_serializing)]
    pub thumbnail_public_id: Option<String>,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    #[serde(rename = "owner")]
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn video_asset(&self) -> MediaAsset {
        MediaAsset::video(self.video_file.clone(), self.video_public_id.clone())
    }

    pub fn thumbnail_asset(&self) -> Option<MediaAsset> {
        match (&self.thumbnail, &self.thumbnail_public_id) {
            (Some(url), Some(public_id)) => Some(MediaAsset::image(url.clone(), public_id.clone())),
            _ => None,
        }
    }

    /// Media stored for this video, for cleanup after deletion.
    pub fn assets(&self) -> Vec<MediaAsset> {
        let mut assets = vec![self.video_asset()];
        assets.extend(self.thumbnail_asset());
        assets
    }

    pub fn visible_to(&self, viewer: Uuid) -> bool {
        self.is_published || self.owner_id == viewer
    }
}

/// A watch-history entry: the video with its owner expanded to a summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: Option<String>,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchedVideo {
    pub fn new(video: Video, owner: OwnerSummary) -> Self {
        WatchedVideo {
            id: video.id,
            title: video.title,
            description: video.description,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            duration: video.duration,
            views: video.views,
            is_published: video.is_published,
            owner,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub video_file: MediaAsset,
    pub thumbnail: Option<MediaAsset>,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<MediaAsset>,
}

/// Query-string form of the listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub limit: Option<u32>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Title,
    Duration,
    Views,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" | "created_at" => Some(SortField::CreatedAt),
            "title" => Some(SortField::Title),
            "duration" => Some(SortField::Duration),
            "views" => Some(SortField::Views),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Title => "title",
            SortField::Duration => "duration",
            SortField::Views => "views",
        }
    }
}

/// Validated listing parameters handed to the store.
#[derive(Debug, Clone)]
pub struct VideoFilter {
    pub viewer: Uuid,
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub owner: Option<Uuid>,
    pub sort: SortField,
    pub descending: bool,
}

impl VideoFilter {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub page: u32,
    pub limit: u32,
    pub total_videos: i64,
    pub total_pages: i64,
}

impl VideoPage {
    pub fn new(videos: Vec<Video>, filter: &VideoFilter, total: i64) -> Self {
        let limit = i64::from(filter.limit);
        VideoPage {
            videos,
            page: filter.page,
            limit: filter.limit,
            total_videos: total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
