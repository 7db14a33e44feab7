// Idempotent schema for jobs and execution records

use crate::errors::DatabaseError;
use sqlx::PgPool;
use tracing::{info, instrument};

const STATEMENTS: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        schedule TEXT NOT NULL,
        api TEXT NOT NULL,
        type TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_executions (
        id UUID PRIMARY KEY,
        job_id UUID NOT NULL REFERENCES jobs(id),
        scheduled_time TIMESTAMPTZ NOT NULL,
        executed_time TIMESTAMPTZ,
        status TEXT NOT NULL,
        http_status INTEGER,
        duration BIGINT,
        error_message TEXT,
        retry_count INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_executions_job_id ON job_executions(job_id)",
    "CREATE INDEX IF NOT EXISTS idx_job_executions_scheduled_time ON job_executions(scheduled_time)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_active ON jobs(active)",
];

/// Create tables and indexes if they do not exist yet
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    }
    info!(statements = STATEMENTS.len(), "Database schema ensured");
    Ok(())
}
