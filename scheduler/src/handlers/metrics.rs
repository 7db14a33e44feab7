use axum::{extract::State, http::header, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use common::models::MetricsSnapshot;

/// Next fire instant of one registered job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJobEntry {
    pub job_id: Uuid,
    pub schedule: String,
    pub next_execution: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SchedulerMetrics {
    pub scheduler: MetricsSnapshot,
    pub jobs: Vec<ScheduledJobEntry>,
}

/// In-process scheduler metrics plus the registered jobs
#[tracing::instrument(skip(state))]
pub async fn scheduler_metrics(State(state): State<AppState>) -> Json<SchedulerMetrics> {
    let scheduler = state.service.get_metrics().await;
    let jobs = state
        .service
        .get_scheduled_jobs()
        .await
        .into_iter()
        .map(|view| ScheduledJobEntry {
            job_id: view.job_id,
            schedule: view.schedule,
            next_execution: view.next_execution,
        })
        .collect();

    Json(SchedulerMetrics { scheduler, jobs })
}

/// Prometheus metrics endpoint
#[tracing::instrument(skip(state))]
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics_handle.render(),
    )
}
