// src/store/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Store, StoreError, DUPLICATE_EMAIL, DUPLICATE_USER};
use crate::media::MediaAsset;
use crate::models::user::{ChannelProfile, NewUser, OwnerSummary, User};
use crate::models::video::{NewVideo, Video, VideoChanges, VideoFilter, VideoPage, WatchedVideo};

const USER_COLUMNS: &str = "id, fullname, username, email, password_hash, avatar, avatar_public_id, \
     cover_image, cover_image_public_id, refresh_token_hash, created_at, updated_at";

const VIDEO_COLUMNS: &str = "id, title, description, video_file, video_public_id, thumbnail, \
     thumbnail_public_id, duration, views, is_published, owner_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn conflict_or_database(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(err)
}

/// Flat row for the watch-history join; the owner columns are prefixed.
#[derive(FromRow)]
struct WatchHistoryRow {
    id: Uuid,
    title: String,
    description: String,
    video_file: String,
    thumbnail: Option<String>,
    duration: f64,
    views: i64,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_id: Uuid,
    owner_fullname: String,
    owner_username: String,
    owner_avatar: String,
}

impl From<WatchHistoryRow> for WatchedVideo {
    fn from(row: WatchHistoryRow) -> Self {
        WatchedVideo {
            id: row.id,
            title: row.title,
            description: row.description,
            video_file: row.video_file,
            thumbnail: row.thumbnail,
            duration: row.duration,
            views: row.views,
            is_published: row.is_published,
            owner: OwnerSummary {
                id: row.owner_id,
                fullname: row.owner_fullname,
                username: row.owner_username,
                avatar: row.owner_avatar,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_video_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &VideoFilter) {
    builder.push(" WHERE (is_published OR owner_id = ");
    builder.push_bind(filter.viewer);
    builder.push(")");

    if let Some(owner) = filter.owner {
        builder.push(" AND owner_id = ");
        builder.push_bind(owner);
    }

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let (cover_url, cover_public_id) = match &user.cover_image {
            Some(asset) => (Some(asset.url.clone()), Some(asset.public_id.clone())),
            None => (None, None),
        };

        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, fullname, username, email, password_hash, avatar, avatar_public_id, \
             cover_image, cover_image_public_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.fullname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar.url)
        .bind(&user.avatar.public_id)
        .bind(cover_url)
        .bind(cover_public_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, DUPLICATE_USER))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2) LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2))",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn set_refresh_token(&self, user_id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(token_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_refresh_token(&self, user_id: Uuid, current: &str, next: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $1, updated_at = NOW() WHERE id = $2 AND refresh_token_hash = $3",
        )
        .bind(next)
        .bind(user_id)
        .bind(current)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        user_id: Uuid,
        fullname: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET fullname = COALESCE($1, fullname), email = COALESCE($2, email), updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(fullname)
        .bind(email)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, DUPLICATE_EMAIL))
    }

    async fn set_avatar(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $1, avatar_public_id = $2, updated_at = NOW() WHERE id = $3 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&asset.url)
        .bind(&asset.public_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_cover_image(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET cover_image = $1, cover_image_public_id = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&asset.url)
        .bind(&asset.public_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn channel_profile(&self, username: &str, viewer: Uuid) -> Result<Option<ChannelProfile>, StoreError> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            "SELECT u.id, u.fullname, u.username, u.email, u.avatar, u.cover_image,
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id) AS subscribers_count,
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id) AS channels_subscribed_to_count,
                    EXISTS(
                        SELECT 1 FROM subscriptions s WHERE s.channel_id = u.id AND s.subscriber_id = $2
                    ) AS is_subscribed
             FROM users u
             WHERE LOWER(u.username) = LOWER($1)",
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn toggle_subscription(&self, subscriber: Uuid, channel: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2")
            .bind(subscriber)
            .bind(channel)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO subscriptions (subscriber_id, channel_id, created_at) VALUES ($1, $2, NOW())
                 ON CONFLICT DO NOTHING",
            )
            .bind(subscriber)
            .bind(channel)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed == 0)
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError> {
        let rows = sqlx::query_as::<_, WatchHistoryRow>(
            "SELECT v.id, v.title, v.description, v.video_file, v.thumbnail, v.duration, v.views,
                    v.is_published, v.created_at, v.updated_at,
                    o.id AS owner_id, o.fullname AS owner_fullname,
                    o.username AS owner_username, o.avatar AS owner_avatar
             FROM watch_history w
             JOIN videos v ON v.id = w.video_id
             JOIN users o ON o.id = v.owner_id
             WHERE w.user_id = $1
             ORDER BY w.watched_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WatchedVideo::from).collect())
    }

    async fn record_view(&self, user_id: Uuid, video_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO watch_history (user_id, video_id, watched_at) VALUES ($1, $2, clock_timestamp())
             ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = clock_timestamp()",
        )
        .bind(user_id)
        .bind(video_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_video(&self, video: NewVideo) -> Result<Video, StoreError> {
        let (thumbnail_url, thumbnail_public_id) = match &video.thumbnail {
            Some(asset) => (Some(asset.url.clone()), Some(asset.public_id.clone())),
            None => (None, None),
        };

        let created = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, title, description, video_file, video_public_id, thumbnail, \
             thumbnail_public_id, duration, views, is_published, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, FALSE, $9, NOW(), NOW()) \
             RETURNING {}",
            VIDEO_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.video_file.url)
        .bind(&video.video_file.public_id)
        .bind(thumbnail_url)
        .bind(thumbnail_public_id)
        .bind(video.duration)
        .bind(video.owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>(&format!("SELECT {} FROM videos WHERE id = $1", VIDEO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn list_videos(&self, filter: &VideoFilter) -> Result<VideoPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM videos");
        push_video_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let direction = if filter.descending { "DESC" } else { "ASC" };
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM videos", VIDEO_COLUMNS));
        push_video_filters(&mut select, filter);
        select.push(format!(" ORDER BY {} {}, id {}", filter.sort.column(), direction, direction));
        select.push(" LIMIT ");
        select.push_bind(i64::from(filter.limit));
        select.push(" OFFSET ");
        select.push_bind(filter.offset());

        let videos = select.build_query_as::<Video>().fetch_all(&self.pool).await?;
        Ok(VideoPage::new(videos, filter, total))
    }

    async fn update_video(&self, id: Uuid, changes: VideoChanges) -> Result<Option<Video>, StoreError> {
        let (thumbnail_url, thumbnail_public_id) = match &changes.thumbnail {
            Some(asset) => (Some(asset.url.clone()), Some(asset.public_id.clone())),
            None => (None, None),
        };

        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET title = COALESCE($1, title), description = COALESCE($2, description), \
             thumbnail = COALESCE($3, thumbnail), thumbnail_public_id = COALESCE($4, thumbnail_public_id), \
             updated_at = NOW() WHERE id = $5 RETURNING {}",
            VIDEO_COLUMNS
        ))
        .bind(changes.title)
        .bind(changes.description)
        .bind(thumbnail_url)
        .bind(thumbnail_public_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    async fn delete_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>(&format!("DELETE FROM videos WHERE id = $1 RETURNING {}", VIDEO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn toggle_publish(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET is_published = NOT is_published, updated_at = NOW() WHERE id = $1 RETURNING {}",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::video::SortField;

    fn filter() -> VideoFilter {
        VideoFilter {
            viewer: Uuid::nil(),
            page: 2,
            limit: 5,
            search: Some("50%_off".to_string()),
            owner: Some(Uuid::nil()),
            sort: SortField::Views,
            descending: false,
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_video_filter_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM videos");
        push_video_filters(&mut builder, &filter());

        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM videos WHERE (is_published OR owner_id = $1) AND owner_id = $2 \
             AND (title ILIKE $3 OR description ILIKE $4)"
        );
    }
}
