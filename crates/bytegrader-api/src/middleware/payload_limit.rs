//! Pre-parse `Content-Length` check, grounded on the shape of
//! `PayloadLimitLayer` (a tower `Layer`/`Service` pair) but expressed as a
//! single `from_fn` middleware since the only decision needed here is a
//! header comparison, not streaming enforcement.
//!
//! Only applied to `/submit`: a `Content-Length` greater than
//! `2 * max_file_size_mb` is rejected before the multipart body is parsed
//! at all (spec §6); the exact limit is re-checked against the parsed
//! upload size inside the handler.

use axum::{
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn content_length_precheck(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = state.config.max_file_size_bytes().saturating_mul(2);

    if let Some(value) = request.headers().get(CONTENT_LENGTH) {
        if let Ok(length) = value.to_str().unwrap_or("").parse::<u64>() {
            if length > limit {
                return Err(ApiError::PayloadTooLarge);
            }
        }
    }

    Ok(next.run(request).await)
}
