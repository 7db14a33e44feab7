use std::sync::Arc;

use common::config::Settings;
use common::scheduler::SchedulerService;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SchedulerService>,
    pub metrics_handle: PrometheusHandle,
    pub config: Arc<Settings>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(service: Arc<SchedulerService>, metrics_handle: PrometheusHandle, config: Settings) -> Self {
        Self {
            service,
            metrics_handle,
            config: Arc::new(config),
        }
    }
}
