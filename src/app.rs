use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{rate_limit::rate_limit_auth, require_auth};
use crate::config::Config;
use crate::error::AppError;
use crate::handlers;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Credential endpoints share the per-IP rate limit.
    let credential_routes = Router::new()
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route(
            "/api/reset-password-request",
            post(handlers::auth::request_password_reset),
        )
        .route("/api/reset-password", post(handlers::auth::reset_password))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/logout", post(handlers::auth::logout))
        .merge(credential_routes);

    let protected_routes = Router::new()
        .route("/api/user", get(handlers::auth::me))
        // Symptoms
        .route(
            "/api/symptoms",
            get(handlers::symptoms::list_symptoms).post(handlers::symptoms::create_symptom),
        )
        .route("/api/symptoms/:id", delete(handlers::symptoms::delete_symptom))
        // Supplements
        .route(
            "/api/supplements",
            get(handlers::supplements::list_supplements)
                .post(handlers::supplements::create_supplement),
        )
        .route(
            "/api/supplements/:id",
            delete(handlers::supplements::delete_supplement),
        )
        .route(
            "/api/supplements/:id/take",
            post(handlers::supplements::take_supplement),
        )
        // Health metrics
        .route(
            "/api/health-metrics",
            get(handlers::health_metrics::list_health_metrics)
                .post(handlers::health_metrics::create_health_metric),
        )
        .route(
            "/api/health-metrics/:id",
            delete(handlers::health_metrics::delete_health_metric),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    with_request_timeout(router, timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = std::iter::once(&config.frontend_url)
        .chain(config.extra_origins.iter())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Bound every request by `timeout`; an expired request answers 408.
fn with_request_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout_error))
            .timeout(timeout),
    )
}

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        AppError::Timeout
    } else {
        AppError::Internal(anyhow::anyhow!("unhandled middleware error: {}", err))
    }
}
