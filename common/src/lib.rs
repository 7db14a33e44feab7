// Common library for the cron scheduler: schedule parsing, driver loop,
// executor, persistence and telemetry shared by the binary and tests

pub mod alert;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod executor;
pub mod models;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod telemetry;
