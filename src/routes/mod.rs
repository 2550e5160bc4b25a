//! Operational HTTP endpoints

pub mod health;
pub mod metrics;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Probe router: `/health`, `/ready`, `/metrics`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
