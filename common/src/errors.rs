// Error handling framework
// Parse-time, dispatch-time and persistence errors for the scheduler core

use thiserror::Error;
use uuid::Uuid;

/// Schedule-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid schedule expression '{expression}': {reason}")]
    InvalidScheduleExpression { expression: String, reason: String },

    #[error("No next execution time found within one year for '{expression}'")]
    NoNextExecution { expression: String },
}

impl ScheduleError {
    pub(crate) fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        ScheduleError::InvalidScheduleExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Job execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("HTTP request failed: {0}")]
    HttpRequestFailed(String),

    #[error("Execution attempt timed out after {0} ms")]
    Timeout(u64),

    #[error("Execution {0} is already queued or running")]
    DuplicateExecution(Uuid),

    #[error("Executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientInit(String),
}

impl ExecutionError {
    /// HTTP status carried by the failure, if the endpoint answered at all
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ExecutionError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Short, fixed label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::HttpStatus(_) => "http_status",
            ExecutionError::HttpRequestFailed(_) => "request_failed",
            ExecutionError::Timeout(_) => "timeout",
            ExecutionError::DuplicateExecution(_) => "duplicate",
            ExecutionError::ExecutorUnavailable(_) => "executor_unavailable",
            ExecutionError::ClientInit(_) => "client_init",
        }
    }
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Storage errors surfaced by the job/execution store collaborator
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Alert webhook request failed: {0}")]
    DeliveryFailed(String),

    #[error("Alert webhook returned status {0}")]
    Rejected(u16),
}

/// Errors returned by the scheduler service operations
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        let code = match err {
            SchedulerError::JobNotFound(_) => "not_found",
            SchedulerError::Validation(_) | SchedulerError::Schedule(_) => "validation_error",
            SchedulerError::Storage(StorageError::NotFound(_)) => "not_found",
            SchedulerError::Storage(StorageError::Conflict(_)) => "conflict",
            SchedulerError::Storage(_) => "storage_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        SchedulerError::from(err).into()
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if code.as_ref() == "23505" => {
                    DatabaseError::DuplicateKey(db_err.message().to_string())
                }
                _ => DatabaseError::QueryFailed(db_err.message().to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for StorageError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => StorageError::NotFound(msg),
            DatabaseError::DuplicateKey(msg) => StorageError::Conflict(msg),
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(err).into()
    }
}
