// Scheduling core: registry of due-time entries, the per-second driver loop,
// rolling statistics and the service wrapping them for the API layer

pub mod engine;
pub mod registry;
pub mod service;
pub mod stats;

pub use engine::{EngineConfig, Scheduler, SchedulerEngine, TickReport};
pub use registry::{ScheduleRegistry, ScheduledJob};
pub use service::{SchedulerService, ServiceConfig};
pub use stats::{SchedulerStats, StatsSnapshot, DRIFT_WINDOW};
