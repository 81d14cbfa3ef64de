use std::sync::Arc;

use sqlx::PgPool;

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

use auth::rate_limit::RateLimitState;
use auth::reset::ResetDelivery;
use auth::session::SessionManager;
use auth::store::SessionStore;
use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub sessions: SessionManager,
    pub rate_limiter: RateLimitState,
    pub reset_delivery: Arc<dyn ResetDelivery>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Config,
        session_store: Arc<dyn SessionStore>,
        reset_delivery: Arc<dyn ResetDelivery>,
    ) -> Self {
        auth::password::warm_dummy_hash();
        let sessions = SessionManager::new(session_store, &config);
        let rate_limiter =
            RateLimitState::new(config.auth_rate_limit_max, config.auth_rate_limit_window_secs);
        Self {
            db,
            config: Arc::new(config),
            sessions,
            rate_limiter,
            reset_delivery,
        }
    }
}
