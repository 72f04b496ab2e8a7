//! Wires `bytegrader_core::RateLimiter` into the axum middleware stack.
//! Runs after admission, so it can key on the IP/username admission already
//! resolved (spec §4.2: admin endpoints are exempt).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::ApiError;
use crate::middleware::admission::AdmittedClient;
use crate::state::AppState;

const ADMIN_PATHS: [&str; 2] = ["/config", "/version"];

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if ADMIN_PATHS.contains(&path) || path == "/health" {
        return Ok(next.run(request).await);
    }

    let client = request.extensions().get::<AdmittedClient>().cloned();
    if let Some(client) = client {
        let ip = client.ip.map(|ip| ip.to_string()).unwrap_or_default();
        let username = client.username.unwrap_or_default();
        let key = bytegrader_core::RateLimiter::key(&ip, &username);

        if !state.rate_limiter.check(&key) {
            return Err(ApiError::RateLimited(state.rate_limiter.error_message()));
        }
    }

    Ok(next.run(request).await)
}
