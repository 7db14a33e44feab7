// Configuration management with layered configuration (file, env)

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which store backs jobs and execution records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Execution records the memory backend retains before evicting the oldest
    #[serde(default = "default_memory_max_executions")]
    pub memory_max_executions: usize,
}

fn default_memory_max_executions() -> usize {
    crate::store::DEFAULT_MEMORY_MAX_EXECUTIONS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            memory_max_executions: default_memory_max_executions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// IANA zone used as "local time" when matching schedules
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_grace_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout_ms: u64,
    /// Additional attempts after the first one
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Unbounded when absent
    #[serde(default)]
    pub max_backlog: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_alert_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_alert_timeout_ms() -> u64 {
    5000
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_alert_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub tracing_endpoint: Option<String>,
}

impl SchedulerConfig {
    /// Parsed timezone; call `Settings::validate` first to surface bad names early
    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| format!("Unknown scheduler timezone '{}'", self.timezone))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl ExecutorConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1000,
            job_timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_backlog: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            timezone: default_timezone(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.storage.backend == StorageBackend::Postgres {
            if self.database.url.is_empty() {
                return Err("Database URL cannot be empty for the postgres backend".to_string());
            }
            if self.database.max_connections == 0 {
                return Err("Database max_connections must be greater than 0".to_string());
            }
        }

        if self.storage.backend == StorageBackend::Memory && self.storage.memory_max_executions == 0 {
            return Err("Storage memory_max_executions must be greater than 0".to_string());
        }

        if self.scheduler.tick_interval_ms == 0 {
            return Err("Scheduler tick_interval_ms must be greater than 0".to_string());
        }
        self.scheduler.tz()?;

        if self.executor.max_concurrent_jobs == 0 {
            return Err("Executor max_concurrent_jobs must be greater than 0".to_string());
        }
        if self.executor.job_timeout_ms == 0 {
            return Err("Executor job_timeout_ms must be greater than 0".to_string());
        }
        if self.executor.max_backlog == Some(0) {
            return Err("Executor max_backlog must be greater than 0 when set".to_string());
        }

        if let Some(url) = &self.alert.webhook_url {
            if url.trim().is_empty() {
                return Err("Alert webhook_url cannot be blank when set".to_string());
            }
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig::default(),
            database: DatabaseConfig {
                url: "postgresql://localhost/cron_scheduler".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            scheduler: SchedulerConfig::default(),
            executor: ExecutorConfig::default(),
            alert: AlertConfig::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                tracing_endpoint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.executor.max_concurrent_jobs, 1000);
        assert_eq!(settings.executor.job_timeout_ms, 30_000);
        assert_eq!(settings.executor.retry_attempts, 3);
        assert_eq!(settings.executor.retry_delay_ms, 1000);
        assert_eq!(settings.scheduler.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_validation_catches_zero_port() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_capacity() {
        let mut settings = Settings::default();
        settings.executor.max_concurrent_jobs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_unknown_timezone() {
        let mut settings = Settings::default();
        settings.scheduler.timezone = "Mars/Olympus_Mons".to_string();
        assert!(settings.validate().is_err());

        settings.scheduler.timezone = "Asia/Ho_Chi_Minh".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_ok());

        settings.storage.backend = StorageBackend::Postgres;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_directory_uses_defaults() {
        let settings = Settings::load_from_path("does-not-exist").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.memory_max_executions, 10_000);
        assert!(settings.alert.webhook_url.is_none());
    }

    #[test]
    fn test_validation_catches_zero_memory_retention() {
        let mut settings = Settings::default();
        settings.storage.memory_max_executions = 0;
        assert!(settings.validate().is_err());
    }
}
