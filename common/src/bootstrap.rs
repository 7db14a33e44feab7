// Bootstrap utilities for binary initialization
// Builds the store, invoker and alert collaborators from `Settings`.

use crate::alert::{AlertNotifier, LogAlertNotifier, WebhookAlertNotifier};
use crate::config::{Settings, StorageBackend};
use crate::executor::{EndpointInvoker, HttpInvoker};
use crate::scheduler::{SchedulerService, ServiceConfig};
use crate::store::{InMemoryStore, PostgresStore, Store};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Initialize the configured store backend
///
/// # Errors
/// Returns error if the PostgreSQL pool or schema setup fails
#[tracing::instrument(skip(settings))]
pub async fn init_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            info!(
                max_executions = settings.storage.memory_max_executions,
                "Using in-memory store"
            );
            Ok(Arc::new(InMemoryStore::with_max_executions(
                settings.storage.memory_max_executions,
            )))
        }
        StorageBackend::Postgres => {
            info!(
                max_connections = settings.database.max_connections,
                "Initializing PostgreSQL store"
            );
            let store = PostgresStore::connect(&settings.database)
                .await
                .context("Failed to initialize PostgreSQL store")?;
            info!("PostgreSQL store initialized");
            Ok(Arc::new(store))
        }
    }
}

/// Webhook notifier when a URL is configured, log-only otherwise
pub fn init_alert_notifier(settings: &Settings) -> Result<Arc<dyn AlertNotifier>> {
    match settings.alert.webhook_url.as_deref() {
        Some(url) => {
            let notifier = WebhookAlertNotifier::new(url, Duration::from_millis(settings.alert.timeout_ms))
                .context("Failed to create alert webhook client")?;
            info!(webhook = %url, "Alert webhook configured");
            Ok(Arc::new(notifier))
        }
        None => {
            info!("No alert webhook configured, alerts are logged only");
            Ok(Arc::new(LogAlertNotifier))
        }
    }
}

pub fn init_invoker(settings: &Settings) -> Result<Arc<dyn EndpointInvoker>> {
    let invoker = HttpInvoker::new(settings.executor.job_timeout())
        .context("Failed to create HTTP client for job endpoints")?;
    Ok(Arc::new(invoker))
}

/// Wire the scheduler service from settings. Does not start it.
///
/// # Errors
/// Returns error if any collaborator fails to initialize
pub async fn init_scheduler_service(settings: &Settings) -> Result<Arc<SchedulerService>> {
    let config = ServiceConfig::from_settings(settings).context("Invalid scheduler configuration")?;
    let store = init_store(settings).await?;
    let invoker = init_invoker(settings)?;
    let alerts = init_alert_notifier(settings)?;

    info!(
        max_concurrent_jobs = settings.executor.max_concurrent_jobs,
        job_timeout_ms = settings.executor.job_timeout_ms,
        retry_attempts = settings.executor.retry_attempts,
        timezone = %settings.scheduler.timezone,
        "Scheduler service configured"
    );
    Ok(Arc::new(SchedulerService::new(config, store, invoker, alerts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_settings_build_memory_service() {
        let settings = Settings::default();
        let service = init_scheduler_service(&settings).await.unwrap();
        assert!(!service.is_running());
        assert!(service.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_timezone_is_reported() {
        let mut settings = Settings::default();
        settings.scheduler.timezone = "Mars/Olympus".to_string();
        let err = init_scheduler_service(&settings).await.err().unwrap();
        assert!(err.to_string().contains("Invalid scheduler configuration"));
    }

    #[test]
    fn test_alert_notifier_selection() {
        let mut settings = Settings::default();
        assert!(init_alert_notifier(&settings).is_ok());
        settings.alert.webhook_url = Some("http://localhost:9/alerts".to_string());
        assert!(init_alert_notifier(&settings).is_ok());
    }
}
