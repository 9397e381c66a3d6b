use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::JobRecord;
use crate::state::AppState;

const HISTORY_LIMIT: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job).get(jobs_history))
        .route("/:job_id", get(job_status))
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    ticker: String,
}

/// POST /api/jobs - submit a ticker for analysis
async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRecord>), AppError> {
    let record = state.pipeline.submit(&request.ticker).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/jobs/:job_id - poll a job's status and accumulated result
async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobRecord>, AppError> {
    let record = state.pipeline.status(job_id).await?;
    Ok(Json(record))
}

/// GET /api/jobs - the most recent jobs, newest first
async fn jobs_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobRecord>>, AppError> {
    let records = state.pipeline.recent(HISTORY_LIMIT).await?;
    Ok(Json(records))
}
