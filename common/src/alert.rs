// Terminal-failure alerting
//
// The runner hands one `FailureAlert` to an `AlertNotifier` per failed
// execution. Delivery is best-effort: errors are returned to the caller,
// which logs them and moves on.

use crate::errors::AlertError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Alert payload, serialized as the webhook body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAlert {
    #[serde(rename = "type")]
    pub alert_type: &'static str,
    pub job_id: Uuid,
    pub execution_id: Uuid,
    pub api: String,
    pub schedule: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureAlert {
    pub const JOB_FAILURE: &'static str = "JOB_FAILURE";

    pub fn job_failure(
        job_id: Uuid,
        execution_id: Uuid,
        api: impl Into<String>,
        schedule: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type: Self::JOB_FAILURE,
            job_id,
            execution_id,
            api: api.into(),
            schedule: schedule.into(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Alert notification interface
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send_alert(&self, alert: &FailureAlert) -> Result<(), AlertError>;
}

/// Log-based alert notifier (default implementation)
///
/// Writes the alert at ERROR level and nothing else.
pub struct LogAlertNotifier;

#[async_trait]
impl AlertNotifier for LogAlertNotifier {
    async fn send_alert(&self, alert: &FailureAlert) -> Result<(), AlertError> {
        error!(
            alert_type = alert.alert_type,
            job_id = %alert.job_id,
            execution_id = %alert.execution_id,
            api = %alert.api,
            schedule = %alert.schedule,
            error_message = %alert.error_message,
            "ALERT: Job execution failed after all retries"
        );
        Ok(())
    }
}

/// Logs the alert, then POSTs it as JSON to a webhook
pub struct WebhookAlertNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::DeliveryFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertNotifier for WebhookAlertNotifier {
    #[instrument(skip(self, alert), fields(execution_id = %alert.execution_id, webhook = %self.url))]
    async fn send_alert(&self, alert: &FailureAlert) -> Result<(), AlertError> {
        LogAlertNotifier.send_alert(alert).await?;

        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| AlertError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Rejected(status.as_u16()));
        }

        info!("Alert sent to webhook");
        Ok(())
    }
}
