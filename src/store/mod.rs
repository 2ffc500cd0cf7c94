//! Persistence boundary. Handlers and services talk to `dyn Store`; the
//! PostgreSQL implementation backs production, the in-memory one backs
//! development without a database and the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::media::MediaAsset;
use crate::models::user::{ChannelProfile, NewUser, User};
use crate::models::video::{NewVideo, Video, VideoChanges, VideoFilter, VideoPage, WatchedVideo};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DUPLICATE_USER: &str = "Username or email already exists";
pub const DUPLICATE_EMAIL: &str = "Email already in use";

#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a user. Fails with [`StoreError::Conflict`] when the username
    /// or email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Finds a user whose username or email matches either identifier.
    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    async fn set_refresh_token(&self, user_id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError>;

    /// Swaps the stored refresh digest only if it still equals `current`.
    /// Returns false when another request already rotated or cleared it.
    async fn rotate_refresh_token(&self, user_id: Uuid, current: &str, next: &str) -> Result<bool, StoreError>;

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Applies only the supplied fields.
    async fn update_account(
        &self,
        user_id: Uuid,
        fullname: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn set_avatar(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError>;

    async fn set_cover_image(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup with subscription aggregates for `viewer`.
    async fn channel_profile(&self, username: &str, viewer: Uuid) -> Result<Option<ChannelProfile>, StoreError>;

    /// Flips the subscription edge; returns whether it now exists.
    async fn toggle_subscription(&self, subscriber: Uuid, channel: Uuid) -> Result<bool, StoreError>;

    /// History in watch order, oldest first.
    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError>;

    /// Counts a view and moves the video to the end of the viewer's history.
    async fn record_view(&self, user_id: Uuid, video_id: Uuid) -> Result<(), StoreError>;

    async fn create_video(&self, video: NewVideo) -> Result<Video, StoreError>;

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    async fn list_videos(&self, filter: &VideoFilter) -> Result<VideoPage, StoreError>;

    async fn update_video(&self, id: Uuid, changes: VideoChanges) -> Result<Option<Video>, StoreError>;

    /// Removes the video (and its history entries), returning what was removed.
    async fn delete_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    async fn toggle_publish(&self, id: Uuid) -> Result<Option<Video>, StoreError>;
}
