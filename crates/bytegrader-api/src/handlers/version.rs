use axum::Json;

use crate::dto::VersionResponse;

/// `GET /version` (admin) — build info (spec §4.8). `build_time` and
/// `git_commit` are populated by the deploy pipeline via environment
/// variables baked in at image build time; neither is produced by this
/// crate (out of scope per spec §1 — "version stamping" is a named
/// external collaborator).
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        build_time: option_env!("BYTEGRADER_BUILD_TIME").unwrap_or("unknown"),
        git_commit: option_env!("BYTEGRADER_GIT_COMMIT").unwrap_or("unknown"),
    })
}
