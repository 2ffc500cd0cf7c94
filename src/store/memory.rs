// src/store/memory.rs
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, DUPLICATE_EMAIL, DUPLICATE_USER};
use crate::media::MediaAsset;
use crate::models::user::{ChannelProfile, NewUser, OwnerSummary, User};
use crate::models::video::{NewVideo, SortField, Video, VideoChanges, VideoFilter, VideoPage, WatchedVideo};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    videos: HashMap<Uuid, Video>,
    // (subscriber, channel)
    subscriptions: HashSet<(Uuid, Uuid)>,
    history: HashMap<Uuid, Vec<Uuid>>,
}

impl State {
    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.username.eq_ignore_ascii_case(username))
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

/// Process-local store with the same semantics as [`super::PgStore`].
/// Uniqueness checks and writes happen under one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_user<F>(&self, user_id: Uuid, apply: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.lock();
        let user = state.users.get_mut(&user_id)?;
        apply(user);
        user.updated_at = Utc::now();
        Some(user.clone())
    }
}

fn matches_search(video: &Video, search: &str) -> bool {
    let needle = search.to_lowercase();
    video.title.to_lowercase().contains(&needle) || video.description.to_lowercase().contains(&needle)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock();
        if state.username_taken(&user.username, None) || state.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(DUPLICATE_USER.to_string()));
        }

        let now = Utc::now();
        let (cover_image, cover_image_public_id) = match user.cover_image {
            Some(asset) => (Some(asset.url), Some(asset.public_id)),
            None => (None, None),
        };
        let created = User {
            id: Uuid::new_v4(),
            fullname: user.fullname,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            avatar: user.avatar.url,
            avatar_public_id: user.avatar.public_id,
            cover_image,
            cover_image_public_id,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let state = self.lock();
        let found = state.users.values().find(|u| {
            username.map_or(false, |name| u.username.eq_ignore_ascii_case(name))
                || email.map_or(false, |mail| u.email.eq_ignore_ascii_case(mail))
        });
        Ok(found.cloned())
    }

    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let state = self.lock();
        Ok(state.username_taken(username, None) || state.email_taken(email, None))
    }

    async fn set_refresh_token(&self, user_id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError> {
        self.update_user(user_id, |user| {
            user.refresh_token_hash = token_hash.map(str::to_string);
        });
        Ok(())
    }

    async fn rotate_refresh_token(&self, user_id: Uuid, current: &str, next: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.users.get_mut(&user_id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(current) => {
                user.refresh_token_hash = Some(next.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.update_user(user_id, |user| {
            user.password_hash = password_hash.to_string();
        });
        Ok(())
    }

    async fn update_account(
        &self,
        user_id: Uuid,
        fullname: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.lock();
        if let Some(email) = email {
            if state.email_taken(email, Some(user_id)) {
                return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string()));
            }
        }

        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(fullname) = fullname {
            user.fullname = fullname.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_avatar(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError> {
        Ok(self.update_user(user_id, |user| {
            user.avatar = asset.url.clone();
            user.avatar_public_id = asset.public_id.clone();
        }))
    }

    async fn set_cover_image(&self, user_id: Uuid, asset: &MediaAsset) -> Result<Option<User>, StoreError> {
        Ok(self.update_user(user_id, |user| {
            user.cover_image = Some(asset.url.clone());
            user.cover_image_public_id = Some(asset.public_id.clone());
        }))
    }

    async fn channel_profile(&self, username: &str, viewer: Uuid) -> Result<Option<ChannelProfile>, StoreError> {
        let state = self.lock();
        let Some(channel) = state
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
        else {
            return Ok(None);
        };

        let subscribers: Vec<Uuid> = state
            .subscriptions
            .iter()
            .filter(|(_, ch)| *ch == channel.id)
            .map(|(subscriber, _)| *subscriber)
            .collect();
        let subscribed_to = state
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == channel.id)
            .count();

        Ok(Some(ChannelProfile {
            id: channel.id,
            fullname: channel.fullname.clone(),
            username: channel.username.clone(),
            email: channel.email.clone(),
            avatar: channel.avatar.clone(),
            cover_image: channel.cover_image.clone(),
            subscribers_count: subscribers.len() as i64,
            channels_subscribed_to_count: subscribed_to as i64,
            is_subscribed: subscribers.contains(&viewer),
        }))
    }

    async fn toggle_subscription(&self, subscriber: Uuid, channel: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let edge = (subscriber, channel);
        if state.subscriptions.remove(&edge) {
            Ok(false)
        } else {
            state.subscriptions.insert(edge);
            Ok(true)
        }
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError> {
        let state = self.lock();
        let Some(entries) = state.history.get(&user_id) else {
            return Ok(Vec::new());
        };

        let watched = entries
            .iter()
            .filter_map(|video_id| {
                let video = state.videos.get(video_id)?;
                let owner = state.users.get(&video.owner_id)?;
                Some(WatchedVideo::new(video.clone(), OwnerSummary::from(owner)))
            })
            .collect();
        Ok(watched)
    }

    async fn record_view(&self, user_id: Uuid, video_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.lock();
        let Some(video) = state.videos.get_mut(&video_id) else {
            return Ok(());
        };
        video.views += 1;

        let entries = state.history.entry(user_id).or_default();
        entries.retain(|id| *id != video_id);
        entries.push(video_id);
        Ok(())
    }

    async fn create_video(&self, video: NewVideo) -> Result<Video, StoreError> {
        let now = Utc::now();
        let (thumbnail, thumbnail_public_id) = match video.thumbnail {
            Some(asset) => (Some(asset.url), Some(asset.public_id)),
            None => (None, None),
        };
        let created = Video {
            id: Uuid::new_v4(),
            title: video.title,
            description: video.description,
            video_file: video.video_file.url,
            video_public_id: video.video_file.public_id,
            thumbnail,
            thumbnail_public_id,
            duration: video.duration,
            views: 0,
            is_published: false,
            owner_id: video.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.lock().videos.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.lock().videos.get(&id).cloned())
    }

    async fn list_videos(&self, filter: &VideoFilter) -> Result<VideoPage, StoreError> {
        let state = self.lock();
        let mut matching: Vec<Video> = state
            .videos
            .values()
            .filter(|v| v.visible_to(filter.viewer))
            .filter(|v| filter.owner.map_or(true, |owner| v.owner_id == owner))
            .filter(|v| filter.search.as_deref().map_or(true, |s| matches_search(v, s)))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = match filter.sort {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Title => a.title.cmp(&b.title),
                SortField::Duration => a.duration.total_cmp(&b.duration),
                SortField::Views => a.views.cmp(&b.views),
            }
            .then_with(|| a.id.cmp(&b.id));
            if filter.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let total = matching.len() as i64;
        let videos = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(VideoPage::new(videos, filter, total))
    }

    async fn update_video(&self, id: Uuid, changes: VideoChanges) -> Result<Option<Video>, StoreError> {
        let mut state = self.lock();
        let Some(video) = state.videos.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            video.title = title;
        }
        if let Some(description) = changes.description {
            video.description = description;
        }
        if let Some(thumbnail) = changes.thumbnail {
            video.thumbnail = Some(thumbnail.url);
            video.thumbnail_public_id = Some(thumbnail.public_id);
        }
        video.updated_at = Utc::now();
        Ok(Some(video.clone()))
    }

    async fn delete_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let mut state = self.lock();
        let removed = state.videos.remove(&id);
        if removed.is_some() {
            for entries in state.history.values_mut() {
                entries.retain(|video_id| *video_id != id);
            }
        }
        Ok(removed)
    }

    async fn toggle_publish(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let mut state = self.lock();
        let Some(video) = state.videos.get_mut(&id) else {
            return Ok(None);
        };
        video.is_published = !video.is_published;
        video.updated_at = Utc::now();
        Ok(Some(video.clone()))
    }
}
