// Admission-controlled executor
//
// A single actor task owns the running set and the FIFO backlog. Submissions,
// completions, load queries and shutdown all go through its command channel,
// so occupancy counts and queue order are only ever mutated in one place.

use super::{Admission, ExecutionDispatcher, ExecutionHandler, ExecutorLoad};
use crate::errors::ExecutionError;
use crate::models::ExecutionRequest;
use crate::telemetry;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Capacity settings for `AdmissionExecutor`
#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    pub max_concurrent: usize,
    /// `None` keeps the backlog unbounded
    pub max_backlog: Option<usize>,
}

enum Command {
    Submit {
        request: ExecutionRequest,
        reply: oneshot::Sender<Result<Admission, ExecutionError>>,
    },
    Load {
        reply: oneshot::Sender<ExecutorLoad>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the executor actor; cheap to clone
#[derive(Clone)]
pub struct AdmissionExecutor {
    commands: mpsc::UnboundedSender<Command>,
}

impl AdmissionExecutor {
    /// Spawn the actor on the current tokio runtime
    pub fn spawn(handler: Arc<dyn ExecutionHandler>, config: AdmissionConfig) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = Actor {
            handler,
            max_concurrent: config.max_concurrent.max(1),
            max_backlog: config.max_backlog,
            commands: receiver,
            channel_open: true,
            accepting: true,
            running: JoinSet::new(),
            in_flight: HashSet::new(),
            backlog: VecDeque::new(),
            queued_ids: HashSet::new(),
            drain_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());

        info!(
            max_concurrent = config.max_concurrent,
            max_backlog = ?config.max_backlog,
            "Admission executor started"
        );
        Self { commands }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ExecutionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ExecutionError::ExecutorUnavailable("executor stopped".to_string()))?;
        response
            .await
            .map_err(|_| ExecutionError::ExecutorUnavailable("executor stopped".to_string()))
    }

    /// Stop accepting work and wait up to `grace` for running and queued
    /// executions to finish. Returns false if the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!(grace_seconds = grace.as_secs(), "Draining executor");
        let drained = self.request(|reply| Command::Shutdown { reply });
        match tokio::time::timeout(grace, drained).await {
            Ok(_) => {
                info!("Executor drained");
                true
            }
            Err(_) => {
                let load = self.load_now().await;
                warn!(
                    in_flight = load.in_flight,
                    queued = load.queued,
                    "Executor shutdown grace period elapsed"
                );
                false
            }
        }
    }

    async fn load_now(&self) -> ExecutorLoad {
        self.request(|reply| Command::Load { reply })
            .await
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionDispatcher for AdmissionExecutor {
    async fn submit(&self, request: ExecutionRequest) -> Result<Admission, ExecutionError> {
        self.request(|reply| Command::Submit { request, reply })
            .await?
    }

    async fn load(&self) -> ExecutorLoad {
        self.load_now().await
    }
}

struct Actor {
    handler: Arc<dyn ExecutionHandler>,
    max_concurrent: usize,
    max_backlog: Option<usize>,
    commands: mpsc::UnboundedReceiver<Command>,
    channel_open: bool,
    accepting: bool,
    running: JoinSet<Uuid>,
    in_flight: HashSet<Uuid>,
    backlog: VecDeque<ExecutionRequest>,
    queued_ids: HashSet<Uuid>,
    drain_waiters: Vec<oneshot::Sender<()>>,
}

impl Actor {
    async fn run(mut self) {
        loop {
            if !self.channel_open && self.running.is_empty() {
                break;
            }

            tokio::select! {
                command = self.commands.recv(), if self.channel_open => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        self.channel_open = false;
                        self.accepting = false;
                    }
                },
                Some(joined) = self.running.join_next(), if !self.running.is_empty() => {
                    self.on_completed(joined);
                }
            }

            if !self.accepting && self.is_idle() {
                for waiter in self.drain_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
        debug!("Admission executor actor exited");
    }

    fn is_idle(&self) -> bool {
        self.running.is_empty() && self.backlog.is_empty()
    }

    fn load(&self) -> ExecutorLoad {
        ExecutorLoad {
            in_flight: self.running.len(),
            queued: self.backlog.len(),
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit { request, reply } => {
                let _ = reply.send(self.admit(request));
            }
            Command::Load { reply } => {
                let _ = reply.send(self.load());
            }
            Command::Shutdown { reply } => {
                self.accepting = false;
                self.drain_waiters.push(reply);
            }
        }
    }

    fn admit(&mut self, request: ExecutionRequest) -> Result<Admission, ExecutionError> {
        if !self.accepting {
            return Err(ExecutionError::ExecutorUnavailable(
                "executor is shutting down".to_string(),
            ));
        }

        let execution_id = request.execution_id;
        if self.in_flight.contains(&execution_id) || self.queued_ids.contains(&execution_id) {
            return Err(ExecutionError::DuplicateExecution(execution_id));
        }

        if self.running.len() < self.max_concurrent {
            self.start(request);
            return Ok(Admission::Started);
        }

        if let Some(limit) = self.max_backlog {
            if self.backlog.len() >= limit {
                return Err(ExecutionError::ExecutorUnavailable(format!(
                    "backlog full ({} queued)",
                    limit
                )));
            }
        }

        warn!(
            execution_id = %execution_id,
            job_id = %request.job_id,
            in_flight = self.running.len(),
            max_concurrent = self.max_concurrent,
            "Concurrency limit reached, queuing execution"
        );
        self.queued_ids.insert(execution_id);
        self.backlog.push_back(request);
        self.publish_load();
        Ok(Admission::Queued)
    }

    fn start(&mut self, request: ExecutionRequest) {
        let execution_id = request.execution_id;
        let handler = Arc::clone(&self.handler);
        self.in_flight.insert(execution_id);
        self.running.spawn(async move {
            let fallback = request.clone();
            if AssertUnwindSafe(handler.handle(request))
                .catch_unwind()
                .await
                .is_err()
            {
                error!(execution_id = %execution_id, "Execution handler panicked");
                if AssertUnwindSafe(handler.abandon(fallback, "execution handler panicked"))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    error!(execution_id = %execution_id, "Failed to record panicked execution");
                }
            }
            execution_id
        });
        self.publish_load();
    }

    fn on_completed(&mut self, joined: Result<Uuid, JoinError>) {
        match joined {
            Ok(execution_id) => {
                self.in_flight.remove(&execution_id);
            }
            Err(e) => {
                // Tasks are never aborted and panics are caught inside, so this
                // only happens while the runtime shuts down; the id is lost with it
                error!(error = %e, "Execution task aborted");
                if self.running.is_empty() {
                    self.in_flight.clear();
                }
            }
        }

        while self.running.len() < self.max_concurrent {
            let Some(next) = self.backlog.pop_front() else {
                break;
            };
            self.queued_ids.remove(&next.execution_id);
            debug!(execution_id = %next.execution_id, "Starting queued execution");
            self.start(next);
        }
        self.publish_load();
    }

    fn publish_load(&self) {
        telemetry::update_executor_load(self.running.len(), self.backlog.len());
    }
}
