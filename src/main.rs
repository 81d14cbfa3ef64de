use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use healthtrack_api::{
    app::build_router,
    auth::{
        rate_limit::spawn_rate_limit_cleanup,
        reset::LogResetDelivery,
        session::spawn_session_pruner,
        store::{MemorySessionStore, PgSessionStore, SessionStore},
    },
    config::{Config, SessionBackend},
    db, AppState,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "healthtrack_api=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    // Database
    let db = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&db).await?;
    tracing::info!("Database migrations applied");

    let session_store: Arc<dyn SessionStore> = match config.session_store {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::Postgres => Arc::new(PgSessionStore::new(db.clone())),
    };
    tracing::info!(backend = ?config.session_store, "Session store selected");

    let addr = config.listen_addr();
    let prune_every = Duration::from_secs(config.session_prune_interval_secs);
    let rate_limit_window = Duration::from_secs(config.auth_rate_limit_window_secs);

    let state = AppState::new(db, config, session_store, Arc::new(LogResetDelivery));

    // Background maintenance
    spawn_session_pruner(state.sessions.clone(), prune_every);
    spawn_rate_limit_cleanup(state.rate_limiter.clone(), rate_limit_window);

    let app = build_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Connect info gives the rate limiter the client IP.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
