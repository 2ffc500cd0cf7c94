// lib.rs - application state and router assembly
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod models;
pub mod response;
pub mod services;
pub mod store;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::{header, HeaderValue, Method},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::media::MediaGateway;
use crate::services::tokens::TokenService;
use crate::store::Store;

// AppState holds the store, the media gateway and the token keys; handlers
// receive it as `Extension<Arc<AppState>>`.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub media: MediaGateway,
    pub tokens: TokenService,
    /// Directory served under `/media` when the local media backend is used.
    pub local_media_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, media: MediaGateway) -> Self {
        let tokens = TokenService::from_config(&config);
        Self {
            config,
            store,
            media,
            tokens,
            local_media_root: None,
        }
    }

    pub fn with_local_media(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_media_root = Some(root.into());
        self
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::users::user_routes())
        .merge(handlers::videos::video_routes())
        .merge(handlers::subscriptions::subscription_routes())
        .fallback(handlers::health::route_not_found);

    if let Some(root) = &state.local_media_root {
        router = router.nest_service("/media", ServeDir::new(root));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CatchPanicLayer::custom(middleware::logging::panic_response))
        .layer(cors_layer(&state.config))
        .layer(Extension(state))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok());

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        None => CorsLayer::permissive(),
    }
}
