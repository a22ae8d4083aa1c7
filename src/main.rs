use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use liquidity_signals::cache::{MemorySnapshotStore, RedisSnapshotStore, SnapshotStore};
use liquidity_signals::{Settings, SignalFeed, SignalSources};

/// Application state shared across handlers
pub struct AppState {
    pub feed: SignalFeed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Liquidity Signals Service...");

    let settings = Settings::load()?;
    settings.validate()?;

    if settings.fred_api_key.is_none() {
        warn!("FRED_API_KEY not set; liquidity and hidden QE signals will be unavailable");
    }
    if settings.etf_gist_url.is_none() {
        warn!("ETF_GIST_URL not set; ETF flow signal will be unavailable");
    }

    // Last-good snapshots: Redis when configured, in-process otherwise
    let snapshots: Arc<dyn SnapshotStore> = match settings.redis_url.as_deref() {
        Some(url) => match RedisSnapshotStore::new(url).await {
            Ok(store) => {
                info!("✓ Redis snapshot store connected");
                Arc::new(store)
            }
            Err(e) => {
                warn!("⚠ Redis unavailable ({}), keeping snapshots in memory", e);
                Arc::new(MemorySnapshotStore::new())
            }
        },
        None => Arc::new(MemorySnapshotStore::new()),
    };

    let sources = SignalSources::from_settings(&settings)?;
    info!("✓ Source clients initialized");

    let feed = SignalFeed::new(sources, &settings, snapshots)?;
    let state = Arc::new(AppState { feed });

    // Build router
    let app = Router::new()
        .route("/api/data", get(handlers::get_data))
        .route("/api/hidden-qe", get(handlers::get_hidden_qe))
        .route("/api/hidden-qe/history", get(handlers::get_hidden_qe_history))
        .route("/health", get(handlers::health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    info!(
        "🚀 Liquidity Signals Service listening on port {} (default mode: {})",
        settings.port,
        settings.score_mode.as_str()
    );

    axum::serve(listener, app).await?;

    Ok(())
}

mod handlers;
