use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::review::{EnqueueResponse, ExtractionReview, JobStatusResponse};
use crate::models::stamp::Stamp;
use crate::routes::ApiError;

/// GET /api/v1/stamps/{id}
pub async fn get_stamp(
    State(state): State<AppState>,
    Path(stamp_id): Path<Uuid>,
) -> Result<Json<Stamp>, ApiError> {
    let stamp = state
        .stamps
        .find_by_id(stamp_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "stamp",
            id: stamp_id,
        })?;
    Ok(Json(stamp))
}

/// POST /api/v1/stamps/{id}/ocr: queue an extraction run for an existing stamp.
pub async fn enqueue_extraction(
    State(state): State<AppState>,
    Path(stamp_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    if state.stamps.find_by_id(stamp_id).await?.is_none() {
        return Err(ApiError::NotFound {
            entity: "stamp",
            id: stamp_id,
        });
    }

    let job = state.jobs.insert(stamp_id).await?;
    metrics::counter!("ocr_jobs_enqueued_total").increment(1);
    tracing::info!(job_id = %job.id, stamp_id = %stamp_id, "Extraction job enqueued");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state.jobs.find(job_id).await?.ok_or(ApiError::NotFound {
        entity: "job",
        id: job_id,
    })?;
    Ok(Json(job.into()))
}

/// PUT /api/v1/stamps/{id}/extraction: accept a manual correction.
pub async fn review_extraction(
    State(state): State<AppState>,
    Path(stamp_id): Path<Uuid>,
    Json(review): Json<ExtractionReview>,
) -> Result<Json<Stamp>, ApiError> {
    review.validate()?;

    let stamp = state
        .stamps
        .update_extraction_fields(stamp_id, &review.into_extraction())
        .await?;
    tracing::info!(stamp_id = %stamp_id, "Manual extraction review stored");

    Ok(Json(stamp))
}
