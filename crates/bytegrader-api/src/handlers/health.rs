use axum::Json;

use crate::dto::HealthResponse;

/// `GET /health` — liveness only, exempt from the admission pipeline
/// entirely (spec §4.1).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
