// Persistence collaborator for jobs and execution records
//
// The scheduler core only talks to the `Store` trait. Two backends ship with
// the crate: an in-process map (default, also used as test double) and
// PostgreSQL via sqlx.

pub mod memory;
pub mod postgres;

use crate::errors::StorageError;
use crate::models::{ExecutionOutcome, ExecutionRecord, ExecutionStats, Job};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Default page size for per-job execution history
pub const DEFAULT_JOB_EXECUTIONS_LIMIT: i64 = 5;
/// Default page size for the global execution history
pub const DEFAULT_EXECUTIONS_LIMIT: i64 = 100;

/// Execution records the memory backend keeps unless configured otherwise
pub const DEFAULT_MEMORY_MAX_EXECUTIONS: usize = 10_000;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<(), StorageError>;

    /// Replace schedule, endpoint and type of an existing job
    async fn update_job(&self, job: &Job) -> Result<(), StorageError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StorageError>;

    async fn get_all_active_jobs(&self) -> Result<Vec<Job>, StorageError>;

    /// Mark a job inactive; unknown ids are a no-op
    async fn deactivate_job(&self, job_id: Uuid) -> Result<(), StorageError>;

    /// Insert a PENDING record
    async fn create_execution(
        &self,
        execution_id: Uuid,
        job_id: Uuid,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Single terminal write. A record that is already terminal is a `Conflict`.
    async fn update_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> Result<(), StorageError>;

    /// Most recent executions of one job, newest scheduled time first
    async fn get_job_executions(
        &self,
        job_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Most recent executions across all jobs, newest scheduled time first
    async fn get_all_executions(&self, limit: i64) -> Result<Vec<ExecutionRecord>, StorageError>;

    async fn get_execution_stats(&self, job_id: Uuid) -> Result<ExecutionStats, StorageError>;

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
