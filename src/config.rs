// src/config.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub access_token_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_secret: String,
    pub refresh_token_ttl: chrono::Duration,
    pub cloudinary: Option<CloudinaryConfig>,
    pub upload_dir: PathBuf,
    pub media_dir: PathBuf,
    pub public_base_url: String,
    pub upload_timeout: Duration,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", 8000u16)?;

        let access_token_secret = get("ACCESS_TOKEN_SECRET").ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?;
        let refresh_token_secret = get("REFRESH_TOKEN_SECRET").ok_or(ConfigError::Missing("REFRESH_TOKEN_SECRET"))?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid {
                key: "REFRESH_TOKEN_SECRET",
                value: "must differ from ACCESS_TOKEN_SECRET".to_string(),
            });
        }

        let access_token_ttl = duration_or(&get, "ACCESS_TOKEN_EXPIRY", "1d")?;
        let refresh_token_ttl = duration_or(&get, "REFRESH_TOKEN_EXPIRY", "10d")?;

        let cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let cookie_secure = match get("COOKIE_SECURE").as_deref() {
            None => true,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "COOKIE_SECURE",
                    value: other.to_string(),
                })
            }
        };

        let bcrypt_cost = parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5u32)?,
            access_token_secret,
            access_token_ttl,
            refresh_token_secret,
            refresh_token_ttl,
            cloudinary,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "./public/temp".to_string()).into(),
            media_dir: get("MEDIA_DIR").unwrap_or_else(|| "./public/media".to_string()).into(),
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            upload_timeout: Duration::from_secs(parse_or(&get, "UPLOAD_TIMEOUT_SECS", 60u64)?),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_MB", 100usize)? * 1024 * 1024,
            bcrypt_cost,
            cookie_secure,
            cors_origin: get("CORS_ORIGIN"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn duration_or<G>(get: &G, key: &'static str, default: &str) -> Result<chrono::Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    parse_duration(&raw).ok_or(ConfigError::Invalid { key, value: raw })
}

/// Parses token lifetimes such as `900`, `15m`, `12h` or `10d`.
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Option<chrono::Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    if amount == 0 {
        return None;
    }

    match unit.trim() {
        "" | "s" => Some(chrono::Duration::seconds(amount)),
        "m" => Some(chrono::Duration::minutes(amount)),
        "h" => Some(chrono::Duration::hours(amount)),
        "d" => Some(chrono::Duration::days(amount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [
        ("ACCESS_TOKEN_SECRET", "access-secret"),
        ("REFRESH_TOKEN_SECRET", "refresh-secret"),
    ];

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("900"), Some(chrono::Duration::seconds(900)));
        assert_eq!(parse_duration("15m"), Some(chrono::Duration::minutes(15)));
        assert_eq!(parse_duration("12h"), Some(chrono::Duration::hours(12)));
        assert_eq!(parse_duration("10d"), Some(chrono::Duration::days(10)));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("10w"), None);
        assert_eq!(parse_duration("d"), None);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&SECRETS)).unwrap();

        assert_eq!(config.port, 8000);
        assert!(config.database_url.is_none());
        assert!(config.cloudinary.is_none());
        assert_eq!(config.access_token_ttl, chrono::Duration::days(1));
        assert_eq!(config.refresh_token_ttl, chrono::Duration::days(10));
        assert_eq!(config.public_base_url, "http://localhost:8000");
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_missing_secret() {
        let err = Config::from_lookup(lookup(&[("ACCESS_TOKEN_SECRET", "a")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("REFRESH_TOKEN_SECRET"));
    }

    #[test]
    fn test_secrets_must_differ() {
        let err = Config::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "same"),
            ("REFRESH_TOKEN_SECRET", "same"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "REFRESH_TOKEN_SECRET", .. }));
    }

    #[test]
    fn test_cloudinary_requires_all_credentials() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("CLOUDINARY_CLOUD_NAME", "demo"));
        pairs.push(("CLOUDINARY_API_KEY", "key"));
        assert!(Config::from_lookup(lookup(&pairs)).unwrap().cloudinary.is_none());

        pairs.push(("CLOUDINARY_API_SECRET", "secret"));
        let cloudinary = Config::from_lookup(lookup(&pairs)).unwrap().cloudinary.unwrap();
        assert_eq!(cloudinary.cloud_name, "demo");
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let mut pairs = SECRETS.to_vec();
        pairs.push(("ACCESS_TOKEN_EXPIRY", "soon"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ACCESS_TOKEN_EXPIRY", .. }));
    }
}
