// Execution attempt runner
//
// Pending record → attempts with linear backoff → one terminal write.
// A terminal failure additionally fires one alert without waiting for it.

use super::{EndpointInvoker, ExecutionHandler};
use crate::alert::{AlertNotifier, FailureAlert};
use crate::errors::{ExecutionError, StorageError};
use crate::models::{ExecutionOutcome, ExecutionRequest, ExecutionStatus};
use crate::retry::RetryStrategy;
use crate::scheduler::stats::SchedulerStats;
use crate::store::Store;
use crate::telemetry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub struct ExecutionRunner {
    invoker: Arc<dyn EndpointInvoker>,
    store: Arc<dyn Store>,
    alerts: Arc<dyn AlertNotifier>,
    retry: Arc<dyn RetryStrategy>,
    stats: Arc<SchedulerStats>,
}

impl ExecutionRunner {
    pub fn new(
        invoker: Arc<dyn EndpointInvoker>,
        store: Arc<dyn Store>,
        alerts: Arc<dyn AlertNotifier>,
        retry: Arc<dyn RetryStrategy>,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        Self {
            invoker,
            store,
            alerts,
            retry,
            stats,
        }
    }

    /// Attempt the call until success or until the retry budget is spent
    pub async fn run_attempts(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        self.attempt_until_done(request).await.0
    }

    /// Outcome plus the last failure, when the outcome is a failure
    async fn attempt_until_done(
        &self,
        request: &ExecutionRequest,
    ) -> (ExecutionOutcome, Option<ExecutionError>) {
        let started = Instant::now();
        let elapsed_ms = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut attempt: u32 = 1;

        loop {
            info!(
                execution_id = %request.execution_id,
                attempt = attempt,
                "Executing job attempt"
            );

            let failure = match self.invoker.invoke(&request.endpoint).await {
                Ok(status) if (200..300).contains(&status) => {
                    let outcome = ExecutionOutcome {
                        status: ExecutionStatus::Success,
                        http_status: Some(status),
                        duration_ms: elapsed_ms(),
                        error_message: None,
                        retry_count: attempt - 1,
                    };
                    return (outcome, None);
                }
                Ok(status) => ExecutionError::HttpStatus(status),
                Err(e) => e,
            };

            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    warn!(
                        execution_id = %request.execution_id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    let outcome = ExecutionOutcome {
                        status: ExecutionStatus::Failed,
                        http_status: failure.http_status(),
                        duration_ms: elapsed_ms(),
                        error_message: Some(failure.to_string()),
                        retry_count: attempt - 1,
                    };
                    return (outcome, Some(failure));
                }
            }
        }
    }

    /// Stats, metrics, logs and the alert for a terminal outcome
    async fn finish(&self, request: &ExecutionRequest, outcome: &ExecutionOutcome, failure_kind: &'static str) {
        self.stats.record_outcome(outcome.status).await;
        telemetry::record_execution_duration(&request.job_id, outcome.duration_ms as f64 / 1000.0);

        match outcome.status {
            ExecutionStatus::Success => {
                telemetry::record_execution_success(&request.job_id);
                info!(
                    http_status = ?outcome.http_status,
                    duration_ms = outcome.duration_ms,
                    retry_count = outcome.retry_count,
                    "Execution succeeded"
                );
            }
            _ => {
                let message = outcome.error_message.clone().unwrap_or_default();
                telemetry::record_execution_failure(&request.job_id, failure_kind);
                error!(
                    http_status = ?outcome.http_status,
                    duration_ms = outcome.duration_ms,
                    retry_count = outcome.retry_count,
                    reason = failure_kind,
                    error = %message,
                    "Execution failed"
                );
                self.spawn_alert(request, &message);
            }
        }
    }

    fn spawn_alert(&self, request: &ExecutionRequest, error_message: &str) {
        let alert = FailureAlert::job_failure(
            request.job_id,
            request.execution_id,
            &request.endpoint,
            &request.schedule,
            error_message,
        );
        let alerts = Arc::clone(&self.alerts);

        tokio::spawn(async move {
            match alerts.send_alert(&alert).await {
                Ok(()) => telemetry::record_alert("delivered"),
                Err(e) => {
                    telemetry::record_alert("failed");
                    error!(
                        execution_id = %alert.execution_id,
                        error = %e,
                        "Failed to deliver failure alert"
                    );
                }
            }
        });
    }
}

#[async_trait]
impl ExecutionHandler for ExecutionRunner {
    #[instrument(skip(self, request), fields(job_id = %request.job_id, execution_id = %request.execution_id))]
    async fn handle(&self, request: ExecutionRequest) {
        if let Err(e) = self
            .store
            .create_execution(request.execution_id, request.job_id, request.scheduled_at)
            .await
        {
            error!(error = %e, "Failed to create pending execution record");
        }

        let (outcome, failure) = self.attempt_until_done(&request).await;

        if let Err(e) = self
            .store
            .update_execution(request.execution_id, &outcome)
            .await
        {
            error!(error = %e, status = %outcome.status, "Failed to record execution outcome");
        }

        let failure_kind = failure.as_ref().map_or("unknown", ExecutionError::kind);
        self.finish(&request, &outcome, failure_kind).await;
    }

    #[instrument(skip(self, request), fields(job_id = %request.job_id, execution_id = %request.execution_id))]
    async fn abandon(&self, request: ExecutionRequest, reason: &str) {
        let outcome = ExecutionOutcome {
            status: ExecutionStatus::Failed,
            http_status: None,
            duration_ms: 0,
            error_message: Some(reason.to_string()),
            retry_count: 0,
        };

        let mut written = self.store.update_execution(request.execution_id, &outcome).await;
        if let Err(StorageError::NotFound(_)) = written {
            // Panicked before the pending record was created
            written = match self
                .store
                .create_execution(request.execution_id, request.job_id, request.scheduled_at)
                .await
            {
                Ok(()) => self.store.update_execution(request.execution_id, &outcome).await,
                Err(e) => Err(e),
            };
        }

        match written {
            Ok(()) => self.finish(&request, &outcome, "panic").await,
            Err(StorageError::Conflict(_)) => {
                warn!("Execution already has a terminal record, nothing to abandon");
            }
            Err(e) => {
                error!(error = %e, "Failed to record abandoned execution");
                self.finish(&request, &outcome, "panic").await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AlertError;
    use crate::retry::LinearBackoff;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// Replays scripted results; the last one repeats forever
    struct ScriptedInvoker {
        script: Mutex<VecDeque<Result<u16, ExecutionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedInvoker {
        fn new(script: Vec<Result<u16, ExecutionError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EndpointInvoker for ScriptedInvoker {
        async fn invoke(&self, _endpoint: &str) -> Result<u16, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<FailureAlert>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertNotifier for RecordingNotifier {
        async fn send_alert(&self, alert: &FailureAlert) -> Result<(), AlertError> {
            self.alerts.lock().await.push(alert.clone());
            if self.fail {
                return Err(AlertError::Rejected(500));
            }
            Ok(())
        }
    }

    struct Fixture {
        runner: ExecutionRunner,
        invoker: Arc<ScriptedInvoker>,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        stats: Arc<SchedulerStats>,
    }

    fn fixture(script: Vec<Result<u16, ExecutionError>>, notifier: RecordingNotifier) -> Fixture {
        let invoker = ScriptedInvoker::new(script);
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(notifier);
        let stats = Arc::new(SchedulerStats::new());
        let runner = ExecutionRunner::new(
            invoker.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(LinearBackoff::from_millis(1, 3)),
            stats.clone(),
        );
        Fixture {
            runner,
            invoker,
            store,
            notifier,
            stats,
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest::new(Uuid::new_v4(), "http://localhost/hook", "*/10 * * * * *", Utc::now())
    }

    async fn wait_for_alerts(notifier: &RecordingNotifier, count: usize) {
        for _ in 0..100 {
            if notifier.alerts.lock().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let f = fixture(vec![Ok(200)], RecordingNotifier::default());
        let request = request();
        f.runner.handle(request.clone()).await;

        let records = f.store.get_all_executions(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].execution_id, request.execution_id);
        assert_eq!(records[0].status, ExecutionStatus::Success);
        assert_eq!(records[0].http_status, Some(200));
        assert_eq!(records[0].retry_count, 0);
        assert_eq!(f.invoker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.stats.snapshot().await.succeeded, 1);
    }

    #[tokio::test]
    async fn test_success_after_retries_reports_retry_count() {
        let f = fixture(
            vec![Ok(500), Ok(500), Ok(500), Ok(200)],
            RecordingNotifier::default(),
        );
        let outcome = f.runner.run_attempts(&request()).await;

        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.retry_count, 3);
        assert_eq!(f.invoker.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_with_one_alert() {
        let f = fixture(
            vec![Err(ExecutionError::Timeout(30_000))],
            RecordingNotifier::default(),
        );
        let request = request();
        f.runner.handle(request.clone()).await;
        wait_for_alerts(&f.notifier, 1).await;

        assert_eq!(f.invoker.calls.load(Ordering::SeqCst), 4);
        let records = f.store.get_all_executions(10).await.unwrap();
        assert_eq!(records[0].status, ExecutionStatus::Failed);
        assert_eq!(records[0].http_status, None);
        assert_eq!(records[0].retry_count, 3);
        assert!(records[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("timed out"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let alerts = f.notifier.alerts.lock().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].execution_id, request.execution_id);
        assert_eq!(f.stats.snapshot().await.failed, 1);
    }

    #[tokio::test]
    async fn test_last_http_status_is_recorded() {
        let f = fixture(
            vec![Err(ExecutionError::HttpRequestFailed("reset".into())), Ok(503)],
            RecordingNotifier::default(),
        );
        let outcome = f.runner.run_attempts(&request()).await;

        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.http_status, Some(503));
        assert_eq!(outcome.error_message.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_affect_outcome() {
        let f = fixture(
            vec![Ok(500)],
            RecordingNotifier {
                fail: true,
                ..Default::default()
            },
        );
        f.runner.handle(request()).await;
        wait_for_alerts(&f.notifier, 1).await;

        let records = f.store.get_all_executions(10).await.unwrap();
        assert_eq!(records[0].status, ExecutionStatus::Failed);
        assert_eq!(f.notifier.alerts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_abandon_writes_one_failed_record_and_alerts() {
        let f = fixture(vec![Ok(200)], RecordingNotifier::default());
        let pending = request();
        f.store
            .create_execution(pending.execution_id, pending.job_id, pending.scheduled_at)
            .await
            .unwrap();
        let never_started = request();

        f.runner.abandon(pending.clone(), "handler panicked").await;
        f.runner.abandon(never_started.clone(), "handler panicked").await;
        wait_for_alerts(&f.notifier, 2).await;

        let records = f.store.get_all_executions(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == ExecutionStatus::Failed));
        assert!(records
            .iter()
            .all(|r| r.error_message.as_deref() == Some("handler panicked")));
        assert_eq!(f.stats.snapshot().await.failed, 2);
        assert_eq!(f.notifier.alerts.lock().await.len(), 2);
        assert_eq!(f.invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abandon_after_terminal_write_is_ignored() {
        let f = fixture(vec![Ok(200)], RecordingNotifier::default());
        let request = request();
        f.runner.handle(request.clone()).await;

        f.runner.abandon(request.clone(), "handler panicked").await;

        let records = f.store.get_all_executions(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Success);
        let snapshot = f.stats.snapshot().await;
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn test_backoff_is_linear() {
        let invoker = ScriptedInvoker::new(vec![Ok(500)]);
        let runner = ExecutionRunner::new(
            invoker.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingNotifier::default()),
            Arc::new(LinearBackoff::from_millis(20, 2)),
            Arc::new(SchedulerStats::new()),
        );

        let outcome = runner.run_attempts(&request()).await;
        // 20 ms after attempt 1 plus 40 ms after attempt 2
        assert!(outcome.duration_ms >= 60, "duration {}", outcome.duration_ms);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 3);
    }
}
