use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::media::MediaAsset;

/// A stored account. Deliberately not `Serialize`: responses go through
/// [`UserResponse`], which has no password or refresh-token fields.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub avatar_public_id: String,
    pub cover_image: Option<String>,
    pub cover_image_public_id: Option<String>,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn avatar_asset(&self) -> MediaAsset {
        MediaAsset::image(self.avatar.clone(), self.avatar_public_id.clone())
    }

    pub fn cover_image_asset(&self) -> Option<MediaAsset> {
        match (&self.cover_image, &self.cover_image_public_id) {
            (Some(url), Some(public_id)) => Some(MediaAsset::image(url.clone(), public_id.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: MediaAsset,
    pub cover_image: Option<MediaAsset>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            fullname: user.fullname,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Channel view of a user with subscription aggregates relative to a viewer.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub avatar: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        OwnerSummary {
            id: user.id,
            fullname: user.fullname.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            fullname: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            avatar: "http://cdn/avatar.png".to_string(),
            avatar_public_id: "images/avatar.png".to_string(),
            cover_image: None,
            cover_image_public_id: None,
            refresh_token_hash: Some("digest".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_response_hides_credentials() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("passwordHash"));
        assert!(!object.contains_key("refreshToken"));
        assert!(!object.contains_key("refreshTokenHash"));
        assert_eq!(object["coverImage"], serde_json::Value::Null);
        assert_eq!(object["username"], "ada");
    }

    #[test]
    fn test_cover_image_asset_requires_both_parts() {
        let mut user = sample_user();
        assert!(user.cover_image_asset().is_none());

        user.cover_image = Some("http://cdn/cover.png".to_string());
        assert!(user.cover_image_asset().is_none());

        user.cover_image_public_id = Some("images/cover.png".to_string());
        assert_eq!(user.cover_image_asset().unwrap().public_id, "images/cover.png");
    }
}
