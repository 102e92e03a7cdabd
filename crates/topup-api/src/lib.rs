//! # topup-api: Axum API Service
//!
//! Thin HTTP adapter over `topup-reconcile`: wallet creation, declarative
//! reconciliation of a wallet's recurring transaction rules, rule listing,
//! and the per-wallet audit trail.
//!
//! ## Routes
//!
//! - `POST /v1/wallets`, `GET /v1/wallets/{wallet_id}`
//! - `PUT|GET /v1/wallets/{wallet_id}/recurring_transaction_rules`
//! - `GET /v1/wallets/{wallet_id}/audit_events` (Postgres mode)
//! - `GET /openapi.json`
//! - `GET /health/*`, `GET /metrics` (unauthenticated)
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsLayer → AuthLayer
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers; reconciliation lives in
//!   `topup-reconcile`.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the auth
/// middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::wallets::router())
        .merge(routes::rules::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .with_state(state.clone());

    // Unauthenticated probes and scrape endpoint.
    let ops = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(ops).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
///
/// In Postgres mode the database must answer a trivial query.
async fn readiness(State(state): State<AppState>) -> Response {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response();
        }
    }
    "ready".into_response()
}

/// GET /metrics: Prometheus text exposition.
///
/// 503 when no recorder was installed (tests, embedded use).
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::ServiceUnavailable("metrics recorder not installed".to_string())
            .into_response(),
    }
}
