// Scheduler engine: the per-second driver loop over the schedule registry

use super::registry::{ScheduleRegistry, ScheduledJob};
use super::stats::SchedulerStats;
use crate::errors::SchedulerError;
use crate::executor::{Admission, ExecutionDispatcher};
use crate::models::{ExecutionRequest, ScheduledJobView};
use crate::schedule::truncate_to_second;
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Configuration for the driver loop
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    /// Zone whose local time is matched against schedules
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            timezone: chrono_tz::UTC,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub dispatched: usize,
    pub queued: usize,
    pub rejected: usize,
    /// Jobs that fired but have no further match within the search horizon
    pub dormant: usize,
}

/// Scheduler trait for the driver loop lifecycle
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the tick loop until `stop` is called
    async fn start(&self) -> Result<(), SchedulerError>;

    /// Signal the tick loop to exit after the current tick
    async fn stop(&self) -> Result<(), SchedulerError>;

    /// Evaluate every registered job against `now`
    async fn tick(&self, now: DateTime<Utc>) -> TickReport;
}

/// Owns the registry and feeds due executions to the dispatcher
pub struct SchedulerEngine {
    config: EngineConfig,
    registry: RwLock<ScheduleRegistry>,
    dispatcher: Arc<dyn ExecutionDispatcher>,
    stats: Arc<SchedulerStats>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerEngine {
    pub fn new(
        config: EngineConfig,
        dispatcher: Arc<dyn ExecutionDispatcher>,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Self {
            config,
            registry: RwLock::new(ScheduleRegistry::new()),
            dispatcher,
            stats,
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn timezone(&self) -> &Tz {
        &self.config.timezone
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Parse and register a job, computing its first fire instant from now
    #[instrument(skip(self, endpoint), fields(job_id = %job_id))]
    pub async fn schedule(
        &self,
        job_id: Uuid,
        endpoint: &str,
        schedule: &str,
    ) -> Result<ScheduledJobView, SchedulerError> {
        let entry = ScheduledJob::new(job_id, endpoint, schedule, Utc::now(), &self.config.timezone)?;
        Ok(self.register(entry).await)
    }

    /// Insert a prepared entry, replacing any entry with the same id
    pub async fn register(&self, entry: ScheduledJob) -> ScheduledJobView {
        let view = entry.view();
        self.registry.write().await.add(entry);

        info!(
            job_id = %view.job_id,
            schedule = %view.schedule,
            next_execution = ?view.next_execution,
            "Job scheduled"
        );
        view
    }

    /// Replace the entry of an already registered job; returns None when the
    /// id is not registered, leaving the registry untouched
    pub async fn reschedule(&self, entry: ScheduledJob) -> Option<ScheduledJobView> {
        let view = entry.view();
        if !self.registry.write().await.update(entry) {
            return None;
        }

        info!(
            job_id = %view.job_id,
            schedule = %view.schedule,
            next_execution = ?view.next_execution,
            "Job rescheduled"
        );
        Some(view)
    }

    /// Remove a job from the registry; unknown ids are a no-op
    pub async fn unschedule(&self, job_id: &Uuid) -> bool {
        let removed = self.registry.write().await.remove(job_id).is_some();
        if removed {
            info!(job_id = %job_id, "Job unscheduled");
        }
        removed
    }

    pub async fn scheduled_jobs(&self) -> Vec<ScheduledJobView> {
        self.registry.read().await.list()
    }

    pub async fn scheduled_job(&self, job_id: &Uuid) -> Option<ScheduledJobView> {
        self.registry
            .read()
            .await
            .list()
            .into_iter()
            .find(|view| view.job_id == *job_id)
    }

    pub async fn job_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Collect due jobs and advance their fire instants under one registry lock
    async fn collect_due(&self, now: DateTime<Utc>, report: &mut TickReport) -> Vec<(ExecutionRequest, u64)> {
        let tz = &self.config.timezone;
        let local = now.with_timezone(tz);
        let mut due = Vec::new();
        let mut registry = self.registry.write().await;

        for job in registry.entries_mut() {
            report.evaluated += 1;

            let Some(expected) = job.next_fire else {
                continue;
            };
            // At most one fire per wall-clock second
            if job.last_fired == Some(now) || !job.expression.matches(&local) {
                continue;
            }

            let drift_ms = (now - expected).num_milliseconds().unsigned_abs();
            job.last_fired = Some(now);
            due.push((
                ExecutionRequest::new(job.job_id, job.endpoint.clone(), job.expression.as_str(), now),
                drift_ms,
            ));

            job.next_fire = match job.expression.next_fire_after(now, tz) {
                Ok(next) => Some(next),
                Err(e) => {
                    error!(job_id = %job.job_id, error = %e, "Job has no next execution, leaving it dormant");
                    report.dormant += 1;
                    None
                }
            };
        }

        due
    }

    async fn dispatch(&self, request: ExecutionRequest, report: &mut TickReport) {
        let job_id = request.job_id;
        let execution_id = request.execution_id;

        match self.dispatcher.submit(request).await {
            Ok(admission) => {
                self.stats.record_triggered().await;
                telemetry::record_execution_triggered(&job_id);
                report.dispatched += 1;
                if admission == Admission::Queued {
                    report.queued += 1;
                }
                debug!(job_id = %job_id, execution_id = %execution_id, ?admission, "Execution dispatched");
            }
            Err(e) => {
                self.stats.record_rejected().await;
                telemetry::record_execution_rejected(&job_id);
                report.rejected += 1;
                error!(job_id = %job_id, execution_id = %execution_id, error = %e, "Execution rejected by executor");
            }
        }
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler engine is already running");
            return Ok(());
        }
        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            timezone = %self.config.timezone,
            "Starting scheduler engine"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if report.dispatched > 0 || report.rejected > 0 {
                        debug!(?report, "Tick processed due jobs");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), SchedulerError> {
        info!("Stopping scheduler engine");
        self.shutdown_tx.send_replace(true);
        Ok(())
    }

    async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let now = truncate_to_second(now);
        let mut report = TickReport::default();

        let due = self.collect_due(now, &mut report).await;
        for (request, drift_ms) in due {
            self.stats.record_drift(drift_ms).await;
            telemetry::record_drift(drift_ms);
            self.dispatch(request, &mut report).await;
        }

        report
    }
}
