use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use std::collections::HashMap;

use bytegrader_core::{Job, Registry};

use crate::dto::SubmitResponse;
use crate::errors::ApiError;
use crate::state::AppState;

/// `POST /submit` — create a job from a multipart upload (spec §4.8).
///
/// Assignment selector resolution order: form field `assignment_id`, query
/// parameter `assignment`, header `X-Assignment-ID` (spec §6).
pub async fn submit(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let header_assignment_id = headers
        .get("x-assignment-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let mut assignment_id: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ValidationError(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("assignment_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::ValidationError(e.to_string()))?;
                assignment_id = Some(value);
            }
            Some("file") => {
                filename = field.file_name().unwrap_or("upload.zip").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::ValidationError(format!("failed to read upload: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let assignment_id = assignment_id
        .or_else(|| query.get("assignment").cloned())
        .or(header_assignment_id)
        .ok_or_else(|| ApiError::ValidationError("missing assignment id".to_string()))?;

    let username = headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingUsername)?
        .to_string();

    let file_bytes = file_bytes
        .ok_or_else(|| ApiError::ValidationError("missing required field 'file'".to_string()))?;

    let max_bytes = state.config.max_file_size_bytes();
    if file_bytes.len() as u64 > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    if !Registry::is_valid_assignment_id_format(&assignment_id) {
        return Err(ApiError::InvalidAssignmentId);
    }
    state
        .registry
        .resolve(&assignment_id)
        .map_err(|_| ApiError::InvalidAssignmentId)?;

    let job = Job::new(filename, file_bytes.len() as u64, assignment_id, username);
    let job_id = job.id.clone();

    state
        .workspace
        .create(&job_id, &file_bytes)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state.store.insert(job).await;

    if state.queue.enqueue(job_id.clone()).is_err() {
        state.store.remove_many(&[job_id.clone()]).await;
        state.workspace.destroy(&job_id).await.ok();
        return Err(ApiError::QueueFull);
    }

    Ok(Json(SubmitResponse {
        job_id,
        status: "queued",
        message: "Job submitted successfully".to_string(),
    }))
}
