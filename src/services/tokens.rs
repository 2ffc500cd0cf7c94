// src/services/tokens.rs
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::auth::{AccessClaims, RefreshClaims, TokenPair};
use crate::models::user::User;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Issues and verifies the access/refresh pair. Each kind has its own
/// secret, so an access token never verifies as a refresh token.
pub struct TokenService {
    access: SigningKey,
    refresh: SigningKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(access_secret: &str, access_ttl: Duration, refresh_secret: &str, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            access: SigningKey::new(access_secret, access_ttl),
            refresh: SigningKey::new(refresh_secret, refresh_ttl),
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.access_token_secret,
            config.access_token_ttl,
            &config.refresh_token_secret,
            config.refresh_token_ttl,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            exp: (now + self.access.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.access.encoding).map_err(TokenError::Encode)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.refresh.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.refresh.encoding).map_err(TokenError::Encode)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user.id)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, &self.access.decoding)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, &self.refresh.decoding)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Result<T, TokenError> {
        decode::<T>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Digest stored in place of the refresh token itself.
pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Parses the `sub` claim back into a user id.
pub fn subject_id(sub: &str) -> Result<Uuid, TokenError> {
    Uuid::parse_str(sub).map_err(|_| TokenError::Invalid)
}
