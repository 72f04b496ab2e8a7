//! IP allowlist, API-key, and username checks applied to every request
//! except `/health` (spec §4.1). CORS and OPTIONS pre-flight are handled by
//! `tower_http::cors::CorsLayer` at the router level, ahead of this layer.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::state::AppState;

const ADMIN_PATHS: [&str; 2] = ["/config", "/version"];

fn is_admin_path(path: &str) -> bool {
    ADMIN_PATHS.contains(&path)
}

/// Client IP resolution order per spec §4.1: first hop of `X-Forwarded-For`,
/// else `X-Real-IP`, else `CF-Connecting-IP`, else the transport peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> Option<IpAddr> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = value.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }
    if let Some(value) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = value.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }
    Some(peer.ip())
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Constant-time membership test against the configured key set. Lengths
/// differ across keys, so equal-length candidates are compared with
/// `ct_eq`; a length mismatch alone is not treated as proof of a mismatch
/// worth optimizing away the comparison for, but it never short-circuits
/// the byte-level compare once lengths do match.
fn key_is_valid(candidate: &str, valid_keys: &std::collections::HashSet<String>) -> bool {
    let candidate = candidate.as_bytes();
    let mut found = false;
    for key in valid_keys {
        let key = key.as_bytes();
        if key.len() != candidate.len() {
            continue;
        }
        if bool::from(key.ct_eq(candidate)) {
            found = true;
        }
    }
    found
}

pub async fn admission_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();

    let ip = client_ip(&headers, peer);

    if let Some(ip) = ip {
        if !state.config.is_ip_allowed(&ip) {
            warn!(%ip, path, "rejected: ip not allowed");
            return Err(ApiError::IpNotAllowed);
        }
    }

    let mut username = None;

    if state.config.require_api_key {
        let key = extract_api_key(&headers);
        let valid = key
            .as_deref()
            .map(|k| key_is_valid(k, &state.config.valid_api_keys))
            .unwrap_or(false);
        if !valid {
            warn!(?ip, path, "rejected: invalid or missing api key");
            return Err(ApiError::Unauthorized);
        }
    }

    if !is_admin_path(&path) {
        let user = headers
            .get("x-username")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        match user {
            Some(user) => username = Some(user.to_string()),
            None => {
                warn!(?ip, path, "rejected: missing username");
                return Err(ApiError::MissingUsername);
            }
        }
    }

    info!(?ip, user = ?username, path, outcome = "admitted", "request admitted");

    let mut request = request;
    request.extensions_mut().insert(AdmittedClient {
        ip,
        username,
    });

    Ok(next.run(request).await)
}

/// Carries the resolved client identity from admission to the rate limiter
/// and handlers, via request extensions.
#[derive(Debug, Clone)]
pub struct AdmittedClient {
    pub ip: Option<IpAddr>,
    pub username: Option<String>,
}
