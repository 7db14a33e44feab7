// Executor module for job execution
//
// The driver loop hands `ExecutionRequest`s to an `ExecutionDispatcher`.
// `AdmissionExecutor` bounds how many run at once and queues the rest;
// each admitted request is carried out by an `ExecutionHandler`, normally the
// `ExecutionRunner` performing the outbound call with retries.

pub mod admission;
pub mod http;
pub mod runner;

use crate::errors::ExecutionError;
use crate::models::ExecutionRequest;
use async_trait::async_trait;
use serde::Serialize;

pub use admission::AdmissionExecutor;
pub use http::HttpInvoker;
pub use runner::ExecutionRunner;

/// Where a submitted request ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Started,
    Queued,
}

/// Executor occupancy at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorLoad {
    pub in_flight: usize,
    pub queued: usize,
}

/// One outbound call to a job endpoint
#[async_trait]
pub trait EndpointInvoker: Send + Sync {
    /// Returns the HTTP status of any response; transport failures and
    /// timeouts are errors
    async fn invoke(&self, endpoint: &str) -> Result<u16, ExecutionError>;
}

/// Carries one admitted execution through to its terminal outcome
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    async fn handle(&self, request: ExecutionRequest);

    /// Record a terminal failure for a request whose `handle` did not finish
    async fn abandon(&self, request: ExecutionRequest, reason: &str);
}

/// Accepts execution requests from the driver loop
#[async_trait]
pub trait ExecutionDispatcher: Send + Sync {
    /// Start or enqueue `request`; never waits for the execution itself
    async fn submit(&self, request: ExecutionRequest) -> Result<Admission, ExecutionError>;

    async fn load(&self) -> ExecutorLoad;
}
