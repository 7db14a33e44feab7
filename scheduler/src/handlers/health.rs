use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub scheduler: &'static str,
    pub store: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint; 503 when the store is unreachable
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let store_ok = match state.service.store().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    let status = HealthStatus {
        status: if store_ok { "healthy" } else { "unhealthy" },
        scheduler: if state.service.is_running() { "running" } else { "stopped" },
        store: if store_ok { "up" } else { "down" },
        timestamp: Utc::now(),
    };
    let code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Service description and route listing
#[tracing::instrument(skip(state))]
pub async fn info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Cron Scheduler API",
        "version": env!("CARGO_PKG_VERSION"),
        "timezone": state.config.scheduler.timezone,
        "endpoints": {
            "POST /api/jobs": "Create a new job",
            "PUT /api/jobs/:id": "Update a job",
            "DELETE /api/jobs/:id": "Deactivate a job",
            "GET /api/jobs": "List active jobs",
            "GET /api/jobs/:id": "Get job details with execution stats",
            "GET /api/jobs/:id/executions": "Get job executions (last 5 by default)",
            "GET /api/executions": "Get recent executions (last 100 by default)",
            "GET /api/metrics": "Get scheduler metrics",
            "GET /api/health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{send, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_store_and_scheduler() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["scheduler"], "stopped");
    }

    #[tokio::test]
    async fn test_info_lists_endpoints() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/api/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["GET /api/metrics"].is_string());
    }
}
