// src/handlers/users.rs
use axum::{
    extract::{multipart::Multipart, Extension},
    routing::{get, patch, post},
    Router,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::extract::{AppJson, AppPath};
use crate::handlers::cookies::{access_cookie, cleared_cookies, refresh_cookie, REFRESH_TOKEN_COOKIE};
use crate::handlers::form::MultipartForm;
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::auth::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, TokenPair, UpdateAccountRequest,
};
use crate::models::user::{ChannelProfile, UserResponse};
use crate::models::video::WatchedVideo;
use crate::response::{ApiResponse, Empty};
use crate::services::auth::{self, Registration};
use crate::services::{channels, history};
use crate::AppState;

pub fn user_routes() -> Router {
    let public_routes = Router::new()
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users/refreshToken", post(refresh_token));

    let protected_routes = Router::new()
        .route("/api/v1/users/logout", post(logout))
        .route("/api/v1/users/changePassword", post(change_password).patch(change_password))
        .route("/api/v1/users/currentUser", get(current_user))
        .route("/api/v1/users/updateAccount", patch(update_account))
        .route("/api/v1/users/avatar", patch(update_avatar))
        .route("/api/v1/users/coverImage", patch(update_cover_image))
        .route("/api/v1/users/c/:username", get(channel_profile))
        .route("/api/v1/users/history", get(watch_history))
        .route_layer(axum::middleware::from_fn(auth_middleware));

    public_routes.merge(protected_routes)
}

fn with_tokens(jar: CookieJar, state: &AppState, pair: &TokenPair) -> CookieJar {
    let secure = state.config.cookie_secure;
    jar.add(access_cookie(&pair.access_token, state.tokens.access_ttl(), secure))
        .add(refresh_cookie(&pair.refresh_token, state.tokens.refresh_ttl(), secure))
}

pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(&mut multipart, &state.config.upload_dir, &["avatar", "coverImage"]).await?;
    let registration = Registration {
        fullname: form.text("fullname"),
        email: form.text("email"),
        username: form.text("username"),
        password: form.text("password"),
        avatar: form.file("avatar"),
        cover_image: form.file("coverImage"),
    };

    let user = auth::register(&state, registration).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let (user, pair) = auth::login(&state, payload).await?;
    let jar = with_tokens(jar, &state, &pair);

    let body = LoginResponse {
        user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, ApiResponse::ok(body, "User logged in successfully")))
}

pub async fn refresh_token(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    body: Option<AppJson<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| body.and_then(|AppJson(b)| b.refresh_token));

    let pair = auth::refresh(&state, token).await?;
    let jar = with_tokens(jar, &state, &pair);
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed")))
}

pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<Empty>)> {
    auth::logout(&state, user.id).await?;

    let [access, refresh] = cleared_cookies(state.config.cookie_secure);
    let jar = jar.add(access).add(refresh);
    Ok((jar, ApiResponse::ok(Empty::default(), "User logged out")))
}

pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Empty>> {
    auth::change_password(&state, &user, payload).await?;
    Ok(ApiResponse::ok(Empty::default(), "Password changed successfully"))
}

pub async fn current_user(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResponse<UserResponse> {
    ApiResponse::ok(UserResponse::from(user), "Current user fetched successfully")
}

pub async fn update_account(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let updated = auth::update_account(&state, user.id, payload).await?;
    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}

pub async fn update_avatar(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(&mut multipart, &state.config.upload_dir, &["avatar"]).await?;
    let updated = auth::update_avatar(&state, &user, form.file("avatar")).await?;
    Ok(ApiResponse::ok(updated, "Avatar updated successfully"))
}

pub async fn update_cover_image(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(&mut multipart, &state.config.upload_dir, &["coverImage"]).await?;
    let updated = auth::update_cover_image(&state, &user, form.file("coverImage")).await?;
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

pub async fn channel_profile(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    AppPath(username): AppPath<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let profile = channels::channel_profile(&state, user.id, &username).await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

pub async fn watch_history(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ApiResponse<Vec<WatchedVideo>>> {
    let videos = history::watch_history(&state, user.id).await?;
    Ok(ApiResponse::ok(videos, "Watch history fetched successfully"))
}
