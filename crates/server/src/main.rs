mod api;
mod artwork;
mod auth;
mod config;
mod range;
mod scan;
mod state;
mod streaming;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use reqwest::Client;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use api::api_router;
use artwork::{ArtworkResolver, ItunesSource, MemoryArtCache};
use auth::AuthStore;
use config::{config_path_from_env, load_or_create_config, resolve_music_root, resolve_path};
use state::AppState;
use store::MusicStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;

    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let session_ttl = Duration::from_secs(config.session_ttl_secs);

    let store_path = resolve_path(&config_path, &config.store_path);
    let db = MusicStore::open_db(&store_path)?;
    let store = MusicStore::new(Arc::clone(&db));
    store.init_tables()?;

    let auth = AuthStore::new(Arc::clone(&db), session_ttl);
    if let Err(err) = auth.init_tables() {
        warn!("Failed to create auth tables: {}", err);
    }

    let artwork = if config.artwork_enabled {
        let client = Client::builder().user_agent("melodeon/0.1").build()?;
        let timeout = Duration::from_secs(config.artwork_timeout_secs);
        Some(ArtworkResolver::new(
            Arc::new(ItunesSource::new(client, timeout)),
            Arc::new(MemoryArtCache::default()),
        ))
    } else {
        info!("Album art resolution disabled");
        None
    };

    let music_root = resolve_music_root(&config_path, &config.music_root);
    match &music_root {
        Some(root) if !root.exists() => {
            warn!("Music directory not found: {}", root.display());
        }
        Some(root) => {
            info!("Serving music from {}", root.display());
        }
        None => {
            info!(
                "Music directory not configured yet; set music_root in {:?}",
                config_path
            );
        }
    }

    let state = AppState {
        store,
        auth,
        config: Arc::new(config),
        artwork,
        music_root,
    };

    let app = Router::new()
        .nest("/api/v1", api_router(state))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
