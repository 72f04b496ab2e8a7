pub mod dto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware::{admission_middleware, content_length_precheck, rate_limit_middleware};
use crate::state::AppState;

/// Assemble the full HTTP surface (spec §4.8) over a ready `AppState`.
/// Split out from `main` so integration tests can drive the router with
/// `tower::ServiceExt::oneshot` without a real container engine or socket.
pub fn build_router(state: AppState) -> Router {
    let submit_routes = Router::new()
        .route("/submit", post(handlers::submit::submit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            content_length_precheck,
        ));

    let request_timeout = Duration::from_secs(state.config.grading_timeout_min * 60 + 30);

    // `/health` is intentionally built as its own leaf, merged in below the
    // admission/rate-limit layers rather than routed through them, so a
    // load balancer's liveness probe never needs credentials (spec §4.1).
    let health_route = Router::new().route("/health", get(handlers::health::health));

    let guarded = Router::new()
        .merge(submit_routes)
        .route("/status/:id", get(handlers::status::status))
        .route("/queue", get(handlers::queue::queue))
        .route("/config", get(handlers::config::config))
        .route("/version", get(handlers::version::version))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ));

    Router::new()
        .merge(guarded)
        .merge(health_route)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
