use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Job Models
// ============================================================================

/// Delivery guarantee of a job; at-least-once is the only supported mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobType {
    #[default]
    #[serde(rename = "ATLEAST_ONCE")]
    AtLeastOnce,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::AtLeastOnce => write!(f, "ATLEAST_ONCE"),
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ATLEAST_ONCE" => Ok(JobType::AtLeastOnce),
            other => Err(format!(
                "Invalid type '{}'. Only ATLEAST_ONCE is supported",
                other
            )),
        }
    }
}

/// Job represents a persisted schedule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "jobId")]
    pub id: Uuid,
    pub schedule: String,
    /// Endpoint invoked on every fire
    pub api: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn from_spec(id: Uuid, spec: &JobSpec) -> Self {
        let now = Utc::now();
        Self {
            id,
            schedule: spec.schedule.trim().to_string(),
            api: spec.api.trim().to_string(),
            job_type: spec.job_type,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create/update payload for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub schedule: String,
    pub api: String,
    #[serde(rename = "type", default)]
    pub job_type: JobType,
}

impl JobSpec {
    pub fn new(schedule: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            api: api.into(),
            job_type: JobType::AtLeastOnce,
        }
    }
}

// ============================================================================
// Execution Models
// ============================================================================

/// ExecutionStatus represents the lifecycle of one dispatched execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "PENDING"),
            ExecutionStatus::Success => write!(f, "SUCCESS"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            _ => Err(format!("Invalid execution status: {}", s)),
        }
    }
}

/// A due job handed from the driver loop to the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub execution_id: Uuid,
    pub job_id: Uuid,
    pub endpoint: String,
    pub schedule: String,
    pub scheduled_at: DateTime<Utc>,
}

impl ExecutionRequest {
    pub fn new(
        job_id: Uuid,
        endpoint: impl Into<String>,
        schedule: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            job_id,
            endpoint: endpoint.into(),
            schedule: schedule.into(),
            scheduled_at,
        }
    }
}

/// Terminal result of an execution, written once per execution id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

/// ExecutionRecord is the persisted view of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub job_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub executed_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub http_status: Option<u16>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl ExecutionRecord {
    pub fn pending(execution_id: Uuid, job_id: Uuid, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            execution_id,
            job_id,
            scheduled_time,
            executed_time: None,
            status: ExecutionStatus::Pending,
            http_status: None,
            duration_ms: None,
            error_message: None,
            retry_count: 0,
        }
    }

    /// Apply the terminal outcome to a pending record
    pub fn complete(&mut self, outcome: &ExecutionOutcome, executed_time: DateTime<Utc>) {
        self.executed_time = Some(executed_time);
        self.status = outcome.status;
        self.http_status = outcome.http_status;
        self.duration_ms = Some(outcome.duration_ms);
        self.error_message = outcome.error_message.clone();
        self.retry_count = outcome.retry_count;
    }
}

/// Aggregated per-job execution statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub avg_duration: Option<i64>,
}

/// A job together with its live schedule and execution statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: Job,
    pub next_execution: Option<DateTime<Utc>>,
    pub stats: ExecutionStats,
}

// ============================================================================
// Scheduler Views
// ============================================================================

/// Read-only snapshot of a registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJobView {
    pub job_id: Uuid,
    pub schedule: String,
    pub api: String,
    pub next_execution: Option<DateTime<Utc>>,
}

/// MetricsSnapshot is the in-process observability summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub is_running: bool,
    pub active_jobs: usize,
    pub active_executions: usize,
    pub queued_executions: usize,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub rejected_executions: u64,
    /// Mean of the retained drift samples
    pub average_drift_ms: f64,
}
