// Scheduler service: job lifecycle over the store, the registry and the executor

use super::engine::{EngineConfig, Scheduler, SchedulerEngine};
use super::registry::ScheduledJob;
use super::stats::SchedulerStats;
use crate::alert::AlertNotifier;
use crate::config::Settings;
use crate::errors::{SchedulerError, ValidationError};
use crate::executor::admission::AdmissionConfig;
use crate::executor::{AdmissionExecutor, EndpointInvoker, ExecutionDispatcher, ExecutionRunner};
use crate::models::{
    ExecutionRecord, Job, JobDetails, JobSpec, MetricsSnapshot, ScheduledJobView,
};
use crate::retry::LinearBackoff;
use crate::store::{Store, DEFAULT_EXECUTIONS_LIMIT, DEFAULT_JOB_EXECUTIONS_LIMIT};
use chrono::Utc;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Largest page a history query may request
const MAX_HISTORY_LIMIT: i64 = 1000;

/// Everything the service needs from `Settings`
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub admission: AdmissionConfig,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub shutdown_grace: Duration,
}

impl ServiceConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ValidationError> {
        let timezone = settings
            .scheduler
            .tz()
            .map_err(|reason| ValidationError::InvalidFieldValue {
                field: "scheduler.timezone".to_string(),
                reason,
            })?;

        Ok(Self {
            engine: EngineConfig {
                tick_interval: settings.scheduler.tick_interval(),
                timezone,
            },
            admission: AdmissionConfig {
                max_concurrent: settings.executor.max_concurrent_jobs,
                max_backlog: settings.executor.max_backlog,
            },
            retry_attempts: settings.executor.retry_attempts,
            retry_delay: Duration::from_millis(settings.executor.retry_delay_ms),
            shutdown_grace: settings.scheduler.shutdown_grace(),
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            admission: AdmissionConfig {
                max_concurrent: 1000,
                max_backlog: None,
            },
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Validate a create/update payload before anything is persisted
fn validate_spec(spec: &JobSpec) -> Result<(), ValidationError> {
    if spec.schedule.trim().is_empty() {
        return Err(ValidationError::MissingField("schedule".to_string()));
    }

    let api = spec.api.trim();
    if api.is_empty() {
        return Err(ValidationError::MissingField("api".to_string()));
    }
    let url = Url::parse(api).map_err(|e| ValidationError::InvalidFieldValue {
        field: "api".to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidFieldValue {
            field: "api".to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(())
}

fn history_limit(limit: Option<i64>, default: i64) -> Result<i64, ValidationError> {
    match limit {
        None => Ok(default),
        Some(n) if n > 0 => Ok(n.min(MAX_HISTORY_LIMIT)),
        Some(n) => Err(ValidationError::InvalidFieldValue {
            field: "limit".to_string(),
            reason: format!("must be positive, got {}", n),
        }),
    }
}

/// Owns the driver loop and the executor; the API layer talks only to this
pub struct SchedulerService {
    engine: Arc<SchedulerEngine>,
    executor: AdmissionExecutor,
    store: Arc<dyn Store>,
    stats: Arc<SchedulerStats>,
    shutdown_grace: Duration,
    started: AtomicBool,
    driver: Mutex<Option<JoinHandle<Result<(), SchedulerError>>>>,
}

impl SchedulerService {
    /// Wire stats, runner, executor and engine. Must be called inside a tokio runtime.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn Store>,
        invoker: Arc<dyn EndpointInvoker>,
        alerts: Arc<dyn AlertNotifier>,
    ) -> Self {
        let stats = Arc::new(SchedulerStats::new());
        let retry = Arc::new(LinearBackoff::new(config.retry_delay, config.retry_attempts));
        let runner = Arc::new(ExecutionRunner::new(
            invoker,
            Arc::clone(&store),
            alerts,
            retry,
            Arc::clone(&stats),
        ));
        let executor = AdmissionExecutor::spawn(runner, config.admission);
        let engine = Arc::new(SchedulerEngine::new(
            config.engine,
            Arc::new(executor.clone()),
            Arc::clone(&stats),
        ));

        Self {
            engine,
            executor,
            store,
            stats,
            shutdown_grace: config.shutdown_grace,
            started: AtomicBool::new(false),
            driver: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn prepare_entry(&self, job_id: Uuid, spec: &JobSpec) -> Result<ScheduledJob, SchedulerError> {
        validate_spec(spec)?;
        let entry = ScheduledJob::new(
            job_id,
            spec.api.trim(),
            spec.schedule.trim(),
            Utc::now(),
            self.engine.timezone(),
        )
        .map_err(ValidationError::from)?;
        Ok(entry)
    }

    /// Validate, persist and register a new job
    #[instrument(skip(self, spec), fields(schedule = %spec.schedule))]
    pub async fn add_job(&self, spec: JobSpec) -> Result<Uuid, SchedulerError> {
        let job_id = Uuid::new_v4();
        let entry = self.prepare_entry(job_id, &spec)?;

        self.store.create_job(&Job::from_spec(job_id, &spec)).await?;
        self.engine.register(entry).await;

        info!(job_id = %job_id, api = %spec.api, "Job created");
        Ok(job_id)
    }

    /// Replace schedule and endpoint of an active job
    #[instrument(skip(self, spec), fields(job_id = %job_id))]
    pub async fn update_job(&self, job_id: Uuid, spec: JobSpec) -> Result<(), SchedulerError> {
        let existing = match self.store.get_job(job_id).await? {
            Some(job) if job.active => job,
            _ => return Err(SchedulerError::JobNotFound(job_id)),
        };
        let entry = self.prepare_entry(job_id, &spec)?;

        let updated = Job {
            created_at: existing.created_at,
            ..Job::from_spec(job_id, &spec)
        };
        self.store.update_job(&updated).await?;
        if self.engine.reschedule(entry).await.is_none() {
            warn!("Job is no longer scheduled, update not applied to the registry");
            return Err(SchedulerError::JobNotFound(job_id));
        }

        info!(schedule = %updated.schedule, api = %updated.api, "Job updated");
        Ok(())
    }

    /// Deactivate in the store and stop scheduling; unknown ids are a no-op
    #[instrument(skip(self))]
    pub async fn remove_job(&self, job_id: Uuid) -> Result<(), SchedulerError> {
        self.store.deactivate_job(job_id).await?;
        self.engine.unschedule(&job_id).await;
        Ok(())
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobDetails, SchedulerError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(SchedulerError::JobNotFound(job_id))?;
        let stats = self.store.get_execution_stats(job_id).await?;
        let next_execution = self
            .engine
            .scheduled_job(&job_id)
            .await
            .and_then(|view| view.next_execution);

        Ok(JobDetails {
            job,
            next_execution,
            stats,
        })
    }

    /// Active jobs as persisted
    pub async fn list_jobs(&self) -> Result<Vec<Job>, SchedulerError> {
        Ok(self.store.get_all_active_jobs().await?)
    }

    pub async fn get_job_executions(
        &self,
        job_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ExecutionRecord>, SchedulerError> {
        let limit = history_limit(limit, DEFAULT_JOB_EXECUTIONS_LIMIT)?;
        if self.store.get_job(job_id).await?.is_none() {
            return Err(SchedulerError::JobNotFound(job_id));
        }
        Ok(self.store.get_job_executions(job_id, limit).await?)
    }

    pub async fn get_executions(&self, limit: Option<i64>) -> Result<Vec<ExecutionRecord>, SchedulerError> {
        let limit = history_limit(limit, DEFAULT_EXECUTIONS_LIMIT)?;
        Ok(self.store.get_all_executions(limit).await?)
    }

    pub async fn get_metrics(&self) -> MetricsSnapshot {
        let stats = self.stats.snapshot().await;
        let load = self.executor.load().await;

        MetricsSnapshot {
            is_running: self.is_running(),
            active_jobs: self.engine.job_count().await,
            active_executions: load.in_flight,
            queued_executions: load.queued,
            total_executions: stats.triggered,
            successful_executions: stats.succeeded,
            failed_executions: stats.failed,
            rejected_executions: stats.rejected,
            average_drift_ms: stats.average_drift_ms,
        }
    }

    pub async fn get_scheduled_jobs(&self) -> Vec<ScheduledJobView> {
        self.engine.scheduled_jobs().await
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Register every active job from the store. Jobs whose schedule no longer
    /// parses are logged and skipped.
    #[instrument(skip(self))]
    pub async fn load_jobs_from_store(&self) -> Result<usize, SchedulerError> {
        let jobs = self.store.get_all_active_jobs().await?;
        let mut loaded = 0;

        for job in jobs {
            match self.engine.schedule(job.id, &job.api, &job.schedule).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(job_id = %job.id, schedule = %job.schedule, error = %e, "Skipping job with unusable schedule"),
            }
        }

        info!(loaded = loaded, "Loaded jobs from store");
        Ok(loaded)
    }

    /// Load persisted jobs and spawn the driver loop. A second call is a no-op;
    /// a stopped service cannot be restarted.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Scheduler service already started");
            return Ok(());
        }

        self.load_jobs_from_store().await?;

        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(async move { engine.start().await });
        *self.driver.lock().await = Some(handle);

        info!("Scheduler service started");
        Ok(())
    }

    /// Stop the driver loop, then drain the executor within the grace period
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        self.engine.stop().await?;

        if let Some(handle) = self.driver.lock().await.take() {
            match handle.await {
                Ok(result) => result?,
                Err(e) => error!(error = %e, "Driver loop task failed"),
            }
        }

        if !self.executor.shutdown(self.shutdown_grace).await {
            warn!("Executions still running after shutdown grace period");
        }

        info!("Scheduler service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::LogAlertNotifier;
    use crate::errors::ExecutionError;
    use crate::models::ExecutionStatus;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingInvoker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EndpointInvoker for CountingInvoker {
        async fn invoke(&self, _endpoint: &str) -> Result<u16, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(200)
        }
    }

    fn service() -> (SchedulerService, Arc<InMemoryStore>, Arc<CountingInvoker>) {
        let store = Arc::new(InMemoryStore::new());
        let invoker = Arc::new(CountingInvoker {
            calls: AtomicUsize::new(0),
        });
        let config = ServiceConfig {
            engine: EngineConfig {
                tick_interval: Duration::from_millis(100),
                timezone: chrono_tz::UTC,
            },
            retry_delay: Duration::from_millis(1),
            shutdown_grace: Duration::from_secs(2),
            ..Default::default()
        };
        let svc = SchedulerService::new(
            config,
            store.clone(),
            invoker.clone(),
            Arc::new(LogAlertNotifier),
        );
        (svc, store, invoker)
    }

    fn spec(schedule: &str) -> JobSpec {
        JobSpec::new(schedule, "http://localhost:4000/hook")
    }

    #[tokio::test]
    async fn test_add_job_persists_and_registers() {
        let (svc, store, _) = service();
        let id = svc.add_job(spec("*/10 * * * * *")).await.unwrap();

        let job = store.get_job(id).await.unwrap().unwrap();
        assert!(job.active);
        assert_eq!(job.schedule, "*/10 * * * * *");

        let scheduled = svc.get_scheduled_jobs().await;
        assert_eq!(scheduled.len(), 1);
        assert!(scheduled[0].next_execution.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_invalid_specs_are_not_persisted() {
        let (svc, store, _) = service();

        for bad in [
            JobSpec::new("* * * *", "http://localhost/hook"),
            JobSpec::new("0 0 0 30 2 *", "http://localhost/hook"),
            JobSpec::new("", "http://localhost/hook"),
            JobSpec::new("* * * * * *", ""),
            JobSpec::new("* * * * * *", "not a url"),
            JobSpec::new("* * * * * *", "ftp://host/file"),
        ] {
            let err = svc.add_job(bad).await.unwrap_err();
            assert!(matches!(err, SchedulerError::Validation(_)), "{err:?}");
        }

        assert!(store.get_all_active_jobs().await.unwrap().is_empty());
        assert!(svc.get_scheduled_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_job_replaces_schedule() {
        let (svc, store, _) = service();
        let id = svc.add_job(spec("* * * * * *")).await.unwrap();
        let created = store.get_job(id).await.unwrap().unwrap().created_at;

        svc.update_job(id, JobSpec::new("0 0 * * * *", "http://localhost:4000/other"))
            .await
            .unwrap();

        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.schedule, "0 0 * * * *");
        assert_eq!(job.api, "http://localhost:4000/other");
        assert_eq!(job.created_at, created);

        let view = &svc.get_scheduled_jobs().await[0];
        assert_eq!(view.schedule, "0 0 * * * *");
        assert_eq!(view.api, "http://localhost:4000/other");
    }

    #[tokio::test]
    async fn test_update_unknown_or_removed_job_is_not_found() {
        let (svc, _, _) = service();
        let missing = Uuid::new_v4();
        assert!(matches!(
            svc.update_job(missing, spec("* * * * * *")).await,
            Err(SchedulerError::JobNotFound(id)) if id == missing
        ));

        let id = svc.add_job(spec("* * * * * *")).await.unwrap();
        svc.remove_job(id).await.unwrap();
        assert!(matches!(
            svc.update_job(id, spec("* * * * * *")).await,
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_does_not_register_unscheduled_job() {
        let (svc, store, _) = service();
        let id = Uuid::new_v4();
        store
            .create_job(&Job::from_spec(id, &spec("* * * * * *")))
            .await
            .unwrap();

        assert!(matches!(
            svc.update_job(id, spec("0 0 * * * *")).await,
            Err(SchedulerError::JobNotFound(_))
        ));
        assert!(svc.get_scheduled_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_job_is_idempotent() {
        let (svc, store, _) = service();
        let id = svc.add_job(spec("* * * * * *")).await.unwrap();

        svc.remove_job(id).await.unwrap();
        svc.remove_job(id).await.unwrap();
        svc.remove_job(Uuid::new_v4()).await.unwrap();

        assert!(svc.get_scheduled_jobs().await.is_empty());
        assert!(!store.get_job(id).await.unwrap().unwrap().active);
        assert!(svc.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_job_includes_stats_and_next_execution() {
        let (svc, _, _) = service();
        let id = svc.add_job(spec("0 * * * * *")).await.unwrap();

        let details = svc.get_job(id).await.unwrap();
        assert_eq!(details.job.id, id);
        assert!(details.next_execution.is_some());
        assert_eq!(details.stats.total, 0);

        assert!(matches!(
            svc.get_job(Uuid::new_v4()).await,
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_limit_validation() {
        let (svc, _, _) = service();
        assert!(svc.get_executions(None).await.unwrap().is_empty());
        assert!(matches!(
            svc.get_executions(Some(0)).await,
            Err(SchedulerError::Validation(_))
        ));
        assert!(matches!(
            svc.get_job_executions(Uuid::new_v4(), None).await,
            Err(SchedulerError::JobNotFound(_))
        ));
        assert_eq!(history_limit(Some(50_000), 5).unwrap(), MAX_HISTORY_LIMIT);
        assert_eq!(history_limit(None, 5).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_load_jobs_skips_unparsable_schedules() {
        let (svc, store, _) = service();
        store
            .create_job(&Job::from_spec(Uuid::new_v4(), &spec("*/5 * * * * *")))
            .await
            .unwrap();
        store
            .create_job(&Job::from_spec(Uuid::new_v4(), &spec("every minute")))
            .await
            .unwrap();

        assert_eq!(svc.load_jobs_from_store().await.unwrap(), 1);
        assert_eq!(svc.get_metrics().await.active_jobs, 1);
    }

    #[tokio::test]
    async fn test_start_fires_jobs_and_stop_drains() {
        let (svc, store, invoker) = service();
        let id = svc.add_job(spec("* * * * * *")).await.unwrap();

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2300)).await;
        assert!(svc.is_running());
        svc.stop().await.unwrap();
        assert!(!svc.is_running());

        let calls = invoker.calls.load(Ordering::SeqCst);
        assert!(calls >= 1, "expected at least one call, got {calls}");

        let records = store.get_job_executions(id, 100).await.unwrap();
        assert_eq!(records.len(), calls);
        assert!(records.iter().all(|r| r.status == ExecutionStatus::Success));

        let metrics = svc.get_metrics().await;
        assert_eq!(metrics.total_executions as usize, calls);
        assert_eq!(metrics.successful_executions as usize, calls);
        assert_eq!(metrics.active_executions, 0);
    }
}
