use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, JobMessage};
use crate::state::AppState;
use common::models::{Job, JobDetails, JobSpec, JobType};

/// Job entry in the listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: Uuid,
    pub schedule: String,
    pub api: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub created_at: DateTime<Utc>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            schedule: job.schedule,
            api: job.api,
            job_type: job.job_type,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobList {
    pub jobs: Vec<JobSummary>,
}

/// Create a new job
#[tracing::instrument(skip(state, payload))]
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<JobSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<JobMessage>), ErrorResponse> {
    let Json(spec) = payload?;
    let job_id = state.service.add_job(spec).await?;

    Ok((
        StatusCode::CREATED,
        Json(JobMessage {
            job_id,
            message: "Job created successfully",
        }),
    ))
}

/// Replace schedule and endpoint of an existing job
#[tracing::instrument(skip(state, payload))]
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<JobSpec>, JsonRejection>,
) -> Result<Json<JobMessage>, ErrorResponse> {
    let Json(spec) = payload?;
    state.service.update_job(id, spec).await?;

    Ok(Json(JobMessage {
        job_id: id,
        message: "Job updated successfully",
    }))
}

/// Deactivate a job; deleting an unknown or already deleted job succeeds
#[tracing::instrument(skip(state))]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobMessage>, ErrorResponse> {
    state.service.remove_job(id).await?;

    Ok(Json(JobMessage {
        job_id: id,
        message: "Job deleted successfully",
    }))
}

#[tracing::instrument(skip(state))]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetails>, ErrorResponse> {
    Ok(Json(state.service.get_job(id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<JobList>, ErrorResponse> {
    let jobs = state.service.list_jobs().await?;
    Ok(Json(JobList {
        jobs: jobs.into_iter().map(JobSummary::from).collect(),
    }))
}
