pub mod executions;
pub mod health;
pub mod jobs;
pub mod metrics;

// Common response types
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::{ApiError, SchedulerError};
use serde::Serialize;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self {
            details: err.details,
            ..Self::new(err.code, err.message)
        }
    }
}

impl From<SchedulerError> for ErrorResponse {
    fn from(err: SchedulerError) -> Self {
        ApiError::from(err).into()
    }
}

/// Malformed or incomplete JSON bodies are validation failures
impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self::new("validation_error", rejection.body_text())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.error, message = %self.message, trace_id = %self.trace_id, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

/// Acknowledgement for job mutations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: uuid::Uuid,
    pub message: &'static str,
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::routes::create_router;
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use common::alert::LogAlertNotifier;
    use common::config::Settings;
    use common::executor::HttpInvoker;
    use common::scheduler::{SchedulerService, ServiceConfig};
    use common::store::InMemoryStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    pub fn test_app() -> (Router, Arc<SchedulerService>) {
        let service = Arc::new(SchedulerService::new(
            ServiceConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(HttpInvoker::new(Duration::from_secs(1)).unwrap()),
            Arc::new(LogAlertNotifier),
        ));
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState::new(service.clone(), handle, Settings::default());
        (create_router(state), service)
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
