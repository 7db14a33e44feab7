// HTTP endpoint invoker

use super::EndpointInvoker;
use crate::errors::ExecutionError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// POSTs an empty JSON object to the job endpoint with a hard per-attempt timeout
pub struct HttpInvoker {
    client: Client,
    timeout: Duration,
}

impl HttpInvoker {
    /// Create a new HttpInvoker with the specified per-attempt timeout
    pub fn new(timeout: Duration) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::ClientInit(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl EndpointInvoker for HttpInvoker {
    #[tracing::instrument(skip(self))]
    async fn invoke(&self, endpoint: &str) -> Result<u16, ExecutionError> {
        let response = self
            .client
            .post(endpoint)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ExecutionError::HttpRequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "HTTP response received");
        Ok(status.as_u16())
    }
}
