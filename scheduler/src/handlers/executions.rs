use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::ErrorResponse;
use crate::state::AppState;
use common::models::ExecutionRecord;

/// Query parameters for execution history
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutions {
    pub job_id: Uuid,
    pub executions: Vec<ExecutionRecord>,
}

#[derive(Debug, Serialize)]
pub struct Executions {
    pub executions: Vec<ExecutionRecord>,
}

/// Most recent executions of one job (5 unless `limit` is given)
#[tracing::instrument(skip(state))]
pub async fn list_job_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<JobExecutions>, ErrorResponse> {
    let executions = state.service.get_job_executions(id, query.limit).await?;
    Ok(Json(JobExecutions {
        job_id: id,
        executions,
    }))
}

/// Most recent executions across all jobs (100 unless `limit` is given)
#[tracing::instrument(skip(state))]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Executions>, ErrorResponse> {
    let executions = state.service.get_executions(query.limit).await?;
    Ok(Json(Executions { executions }))
}
