use axum::{
    extract::{Extension, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::cookies::ACCESS_TOKEN_COOKIE;
use crate::models::user::User;
use crate::services::tokens::{subject_id, TokenError};
use crate::AppState;

/// The authenticated account, inserted into request extensions by
/// [`auth_middleware`].
#[derive(Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // The cookie wins over the Authorization header.
    let token = jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.tokens.verify_access_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "access token rejected");
        match e {
            TokenError::Expired => ApiError::unauthorized("Access token expired"),
            _ => ApiError::unauthorized("Invalid access token"),
        }
    })?;

    let user_id = subject_id(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid access token"))?;
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
