use std::sync::Arc;

use vidtube::config::Config;
use vidtube::db;
use vidtube::media::cloudinary::CloudinaryClient;
use vidtube::media::local::LocalMediaStorage;
use vidtube::media::{MediaGateway, MediaStorage};
use vidtube::store::{MemoryStore, PgStore, Store};
use vidtube::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    for dir in [&config.upload_dir, &config.media_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(path = %dir.display(), error = %e, "failed to create directory");
            std::process::exit(1);
        }
    }

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections)
                .await
                .expect("Failed to create database pool.");
            tracing::info!("Connected to PostgreSQL");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let (storage, local_root): (Arc<dyn MediaStorage>, _) = match config.cloudinary.clone() {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "using Cloudinary media storage");
            (Arc::new(CloudinaryClient::new(cloudinary)), None)
        }
        None => {
            tracing::warn!(dir = %config.media_dir.display(), "Cloudinary not configured; storing media locally");
            let local = LocalMediaStorage::new(config.media_dir.clone(), config.public_base_url.clone());
            let root = local.root().to_path_buf();
            (Arc::new(local), Some(root))
        }
    };

    let media = MediaGateway::new(storage, config.upload_timeout);
    let port = config.port;

    let mut state = AppState::new(config, store, media);
    if let Some(root) = local_root {
        state = state.with_local_media(root);
    }

    let app = vidtube::app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("🎬 vidtube listening on 0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,vidtube=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,vidtube=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // LOG_FORMAT=json for log aggregation, human-readable otherwise.
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);
    Ok(())
}
