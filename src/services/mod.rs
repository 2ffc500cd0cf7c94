pub mod auth;
pub mod channels;
pub mod history;
pub mod tokens;
pub mod videos;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ApiError, ApiResult};
use crate::media::{detect_kind, MediaKind, TempUpload};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9_.-]+$").unwrap();
}

/// Trims a form value; blank counts as absent.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Rejects an upload whose extension does not match `expected`. The temp
/// file is dropped (and removed) on rejection.
pub(crate) fn require_kind(file: &TempUpload, expected: MediaKind, message: &str) -> ApiResult<()> {
    if detect_kind(file.original_name()) == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::bad_request(message))
    }
}
