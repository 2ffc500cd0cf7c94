// src/services/auth.rs
use bcrypt::{hash, verify};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::media::{MediaAsset, MediaKind, TempUpload};
use crate::models::auth::{ChangePasswordRequest, LoginRequest, TokenPair, UpdateAccountRequest};
use crate::models::user::{NewUser, User, UserResponse};
use crate::services::tokens::{refresh_token_digest, subject_id};
use crate::services::{is_valid_email, is_valid_username, require_kind, trimmed};
use crate::store::{StoreError, DUPLICATE_USER};
use crate::AppState;

/// Fields collected from the registration form.
#[derive(Default)]
pub struct Registration {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<TempUpload>,
    pub cover_image: Option<TempUpload>,
}

pub async fn register(state: &AppState, form: Registration) -> ApiResult<UserResponse> {
    let Registration {
        fullname,
        email,
        username,
        password,
        avatar,
        cover_image,
    } = form;

    let password = password.filter(|p| !p.trim().is_empty());
    let (Some(fullname), Some(email), Some(username), Some(password)) =
        (trimmed(fullname), trimmed(email), trimmed(username), password)
    else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    let email = email.to_lowercase();
    let username = username.to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if !is_valid_username(&username) {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits, '.', '_' and '-'",
        ));
    }

    if state.store.user_exists(&username, &email).await? {
        return Err(ApiError::Conflict(DUPLICATE_USER.to_string()));
    }

    let avatar = avatar.ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    require_kind(&avatar, MediaKind::Image, "Avatar must be an image")?;
    if let Some(cover) = &cover_image {
        require_kind(cover, MediaKind::Image, "Cover image must be an image")?;
    }

    let avatar = state
        .media
        .upload(avatar, MediaKind::Image)
        .await
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let cover_image = state.media.upload_optional(cover_image, MediaKind::Image).await;

    let password_hash = match hash(&password, state.config.bcrypt_cost) {
        Ok(h) => h,
        Err(e) => {
            state.media.delete_later(uploaded(&avatar, cover_image.as_ref()));
            return Err(ApiError::internal(format!("Failed to hash password: {}", e)));
        }
    };

    let new_user = NewUser {
        fullname,
        username,
        email,
        password_hash,
        avatar: avatar.clone(),
        cover_image: cover_image.clone(),
    };

    match state.store.create_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "user registered");
            Ok(UserResponse::from(user))
        }
        Err(e) => {
            // Lost a race on the unique indexes, or the insert failed outright.
            state.media.delete_later(uploaded(&avatar, cover_image.as_ref()));
            if let StoreError::Conflict(_) = &e {
                tracing::warn!(error = %e, "registration conflicted after upload");
            }
            Err(e.into())
        }
    }
}

fn uploaded(avatar: &MediaAsset, cover: Option<&MediaAsset>) -> Vec<MediaAsset> {
    let mut assets = vec![avatar.clone()];
    assets.extend(cover.cloned());
    assets
}

/// Verifies credentials and issues a fresh pair. The refresh digest replaces
/// whatever was stored, so older refresh tokens stop working.
pub async fn login(state: &AppState, payload: LoginRequest) -> ApiResult<(UserResponse, TokenPair)> {
    let username = trimmed(payload.username).map(|u| u.to_lowercase());
    let email = trimmed(payload.email).map(|e| e.to_lowercase());
    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }

    let user = state
        .store
        .find_user_by_login(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let password = payload.password.unwrap_or_default();
    match verify(&password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::unauthorized("Invalid user credentials")),
        Err(e) => return Err(ApiError::internal(format!("Password verification failed: {}", e))),
    }

    let pair = issue_pair(state, &user)?;
    state
        .store
        .set_refresh_token(user.id, Some(&refresh_token_digest(&pair.refresh_token)))
        .await?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((UserResponse::from(user), pair))
}

pub async fn logout(state: &AppState, user_id: Uuid) -> ApiResult<()> {
    state.store.set_refresh_token(user_id, None).await?;
    tracing::info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Exchanges a refresh token for a new pair. Each refresh token can be used
/// once; a replayed or logged-out token is rejected.
pub async fn refresh(state: &AppState, token: Option<String>) -> ApiResult<TokenPair> {
    let token = trimmed(token).ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.tokens.verify_refresh_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "refresh token rejected");
        ApiError::unauthorized("Invalid refresh token")
    })?;
    let user_id = subject_id(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let current = refresh_token_digest(&token);
    if user.refresh_token_hash.as_deref() != Some(current.as_str()) {
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let pair = issue_pair(state, &user)?;
    let rotated = state
        .store
        .rotate_refresh_token(user.id, &current, &refresh_token_digest(&pair.refresh_token))
        .await?;
    if !rotated {
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    tracing::debug!(user_id = %user.id, "access token refreshed");
    Ok(pair)
}

pub async fn change_password(state: &AppState, user: &User, payload: ChangePasswordRequest) -> ApiResult<()> {
    let (Some(old_password), Some(new_password)) = (
        payload.old_password.filter(|p| !p.is_empty()),
        payload.new_password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Old and new password are required"));
    };

    match verify(&old_password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::bad_request("Invalid old password")),
        Err(e) => return Err(ApiError::internal(format!("Password verification failed: {}", e))),
    }

    let password_hash = hash(&new_password, state.config.bcrypt_cost)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    state.store.set_password(user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(())
}

pub async fn update_account(state: &AppState, user_id: Uuid, payload: UpdateAccountRequest) -> ApiResult<UserResponse> {
    let fullname = trimmed(payload.fullname);
    let email = trimmed(payload.email).map(|e| e.to_lowercase());
    if fullname.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Fullname or email is required"));
    }
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(ApiError::bad_request("Invalid email address"));
        }
    }

    let user = state
        .store
        .update_account(user_id, fullname.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(UserResponse::from(user))
}

pub async fn update_avatar(state: &AppState, user: &User, file: Option<TempUpload>) -> ApiResult<UserResponse> {
    let file = file.ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;
    require_kind(&file, MediaKind::Image, "Avatar must be an image")?;

    let asset = state
        .media
        .upload(file, MediaKind::Image)
        .await
        .ok_or_else(|| ApiError::bad_request("Error while uploading avatar"))?;

    let updated = match state.store.set_avatar(user.id, &asset).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.media.delete_later(vec![asset]);
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => {
            state.media.delete_later(vec![asset]);
            return Err(e.into());
        }
    };

    let previous = user.avatar_asset();
    if !previous.public_id.is_empty() && previous.public_id != asset.public_id {
        state.media.delete_later(vec![previous]);
    }
    Ok(UserResponse::from(updated))
}

pub async fn update_cover_image(state: &AppState, user: &User, file: Option<TempUpload>) -> ApiResult<UserResponse> {
    let file = file.ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;
    require_kind(&file, MediaKind::Image, "Cover image must be an image")?;

    let asset = state
        .media
        .upload(file, MediaKind::Image)
        .await
        .ok_or_else(|| ApiError::bad_request("Error while uploading cover image"))?;

    let updated = match state.store.set_cover_image(user.id, &asset).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.media.delete_later(vec![asset]);
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => {
            state.media.delete_later(vec![asset]);
            return Err(e.into());
        }
    };

    if let Some(previous) = user.cover_image_asset() {
        if previous.public_id != asset.public_id {
            state.media.delete_later(vec![previous]);
        }
    }
    Ok(UserResponse::from(updated))
}

fn issue_pair(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    state
        .tokens
        .issue_pair(user)
        .map_err(|e| ApiError::internal(format!("Something went wrong while generating tokens: {}", e)))
}
