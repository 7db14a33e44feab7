// Rolling execution counters and the drift sample window

use crate::models::ExecutionStatus;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Number of drift samples kept for the rolling average
pub const DRIFT_WINDOW: usize = 1000;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub triggered: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub drift_samples: usize,
    pub average_drift_ms: f64,
}

#[derive(Default)]
struct Counters {
    triggered: u64,
    succeeded: u64,
    failed: u64,
    rejected: u64,
    drift: VecDeque<u64>,
    drift_sum: u64,
}

/// Shared by the driver loop (drift, triggers) and the runner (outcomes)
#[derive(Default)]
pub struct SchedulerStats {
    counters: Mutex<Counters>,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a drift sample, evicting the oldest beyond `DRIFT_WINDOW`
    pub async fn record_drift(&self, drift_ms: u64) {
        let mut counters = self.counters.lock().await;
        counters.drift.push_back(drift_ms);
        counters.drift_sum += drift_ms;
        if counters.drift.len() > DRIFT_WINDOW {
            if let Some(evicted) = counters.drift.pop_front() {
                counters.drift_sum -= evicted;
            }
        }
    }

    pub async fn record_triggered(&self) {
        self.counters.lock().await.triggered += 1;
    }

    pub async fn record_rejected(&self) {
        self.counters.lock().await.rejected += 1;
    }

    pub async fn record_outcome(&self, status: ExecutionStatus) {
        let mut counters = self.counters.lock().await;
        match status {
            ExecutionStatus::Success => counters.succeeded += 1,
            ExecutionStatus::Failed => counters.failed += 1,
            ExecutionStatus::Pending => {}
        }
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters.lock().await;
        let samples = counters.drift.len();
        StatsSnapshot {
            triggered: counters.triggered,
            succeeded: counters.succeeded,
            failed: counters.failed,
            rejected: counters.rejected,
            drift_samples: samples,
            average_drift_ms: if samples == 0 {
                0.0
            } else {
                counters.drift_sum as f64 / samples as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_window_reports_zero_drift() {
        let stats = SchedulerStats::new();
        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.drift_samples, 0);
        assert_eq!(snapshot.average_drift_ms, 0.0);
    }

    #[tokio::test]
    async fn test_average_is_mean_of_samples() {
        let stats = SchedulerStats::new();
        for drift in [10, 20, 45] {
            stats.record_drift(drift).await;
        }
        assert_eq!(stats.snapshot().await.average_drift_ms, 25.0);
    }

    #[tokio::test]
    async fn test_window_keeps_latest_thousand() {
        let stats = SchedulerStats::new();
        // 500 samples of 1000 ms, then 1000 samples of 2 ms
        for _ in 0..500 {
            stats.record_drift(1000).await;
        }
        for _ in 0..DRIFT_WINDOW {
            stats.record_drift(2).await;
        }

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.drift_samples, DRIFT_WINDOW);
        assert_eq!(snapshot.average_drift_ms, 2.0);
    }

    #[tokio::test]
    async fn test_counters() {
        let stats = SchedulerStats::new();
        stats.record_triggered().await;
        stats.record_triggered().await;
        stats.record_rejected().await;
        stats.record_outcome(ExecutionStatus::Success).await;
        stats.record_outcome(ExecutionStatus::Failed).await;
        stats.record_outcome(ExecutionStatus::Pending).await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.triggered, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 1);
    }
}
