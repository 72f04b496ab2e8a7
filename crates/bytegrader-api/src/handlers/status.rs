use axum::extract::{Path, State};
use axum::Json;

use crate::dto::StatusResponse;
use crate::errors::ApiError;
use crate::state::AppState;

/// `GET /status/{id}` — point read of a job record (spec §4.8).
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = state.store.get(&id).await.ok_or(ApiError::NotFound)?;
    Ok(Json(StatusResponse { job }))
}
