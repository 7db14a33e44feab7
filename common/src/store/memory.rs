// In-process store backed by hash maps

use super::{Store, DEFAULT_MEMORY_MAX_EXECUTIONS};
use crate::errors::StorageError;
use crate::models::{ExecutionOutcome, ExecutionRecord, ExecutionStats, ExecutionStatus, Job};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, Job>,
    executions: HashMap<Uuid, ExecutionRecord>,
    /// Execution ids in creation order, oldest first
    created: VecDeque<Uuid>,
}

impl State {
    /// Drop the oldest finished records until at most `max` remain.
    /// Pending records are kept so their terminal write still lands.
    fn evict_finished(&mut self, max: usize) {
        while self.executions.len() > max {
            let executions = &self.executions;
            let Some(position) = self.created.iter().position(|id| {
                executions
                    .get(id)
                    .map_or(true, |record| record.status.is_terminal())
            }) else {
                break;
            };
            if let Some(id) = self.created.remove(position) {
                self.executions.remove(&id);
                debug!(execution_id = %id, "Evicted execution record");
            }
        }
    }
}

/// Store that keeps everything in memory; contents are lost on restart.
///
/// Jobs are kept forever. Execution history is capped: once more than
/// `max_executions` records exist, the oldest finished ones are evicted.
pub struct InMemoryStore {
    state: RwLock<State>,
    max_executions: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_max_executions(DEFAULT_MEMORY_MAX_EXECUTIONS)
    }

    pub fn with_max_executions(max_executions: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            max_executions: max_executions.max(1),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut records: Vec<ExecutionRecord>, limit: i64) -> Vec<ExecutionRecord> {
    records.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
    records.truncate(limit.max(0) as usize);
    records
}

#[async_trait]
impl Store for InMemoryStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create_job(&self, job: &Job) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(StorageError::Conflict(format!("Job {} already exists", job.id)));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn update_job(&self, job: &Job) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let existing = state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StorageError::NotFound(format!("Job {}", job.id)))?;
        existing.schedule = job.schedule.clone();
        existing.api = job.api.clone();
        existing.job_type = job.job_type;
        existing.updated_at = job.updated_at;
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StorageError> {
        Ok(self.state.read().await.jobs.get(&job_id).cloned())
    }

    async fn get_all_active_jobs(&self) -> Result<Vec<Job>, StorageError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state.jobs.values().filter(|j| j.active).cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn deactivate_job(&self, job_id: Uuid) -> Result<(), StorageError> {
        if let Some(job) = self.state.write().await.jobs.get_mut(&job_id) {
            job.active = false;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_execution(
        &self,
        execution_id: Uuid,
        job_id: Uuid,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.executions.contains_key(&execution_id) {
            return Err(StorageError::Conflict(format!(
                "Execution {} already exists",
                execution_id
            )));
        }
        state.executions.insert(
            execution_id,
            ExecutionRecord::pending(execution_id, job_id, scheduled_time),
        );
        state.created.push_back(execution_id);
        state.evict_finished(self.max_executions);
        Ok(())
    }

    async fn update_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let record = state
            .executions
            .get_mut(&execution_id)
            .ok_or_else(|| StorageError::NotFound(format!("Execution {}", execution_id)))?;
        if record.status.is_terminal() {
            return Err(StorageError::Conflict(format!(
                "Execution {} already recorded as {}",
                execution_id, record.status
            )));
        }
        record.complete(outcome, Utc::now());
        state.evict_finished(self.max_executions);
        Ok(())
    }

    async fn get_job_executions(
        &self,
        job_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        let state = self.state.read().await;
        let records = state
            .executions
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        Ok(newest_first(records, limit))
    }

    async fn get_all_executions(&self, limit: i64) -> Result<Vec<ExecutionRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(newest_first(state.executions.values().cloned().collect(), limit))
    }

    async fn get_execution_stats(&self, job_id: Uuid) -> Result<ExecutionStats, StorageError> {
        let state = self.state.read().await;
        let mut stats = ExecutionStats::default();
        let mut duration_sum = 0u64;
        let mut duration_count = 0u64;

        for record in state.executions.values().filter(|r| r.job_id == job_id) {
            stats.total += 1;
            match record.status {
                ExecutionStatus::Success => stats.success += 1,
                ExecutionStatus::Failed => stats.failed += 1,
                ExecutionStatus::Pending => {}
            }
            if let Some(duration) = record.duration_ms {
                duration_sum += duration;
                duration_count += 1;
            }
        }

        if duration_count > 0 {
            stats.avg_duration = Some((duration_sum as f64 / duration_count as f64).round() as i64);
        }
        Ok(stats)
    }
}
