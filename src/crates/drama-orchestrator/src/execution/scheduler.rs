//! Bounded task scheduler
//!
//! `submit` pushes a task id onto a bounded queue and returns at once. A
//! dispatcher pulls ids off the queue, waits for one of
//! `max_concurrent_tasks` permits and runs the task on a `JoinSet`. A full
//! queue rejects the submission with `QueueFull`.

use super::engine::TaskExecutionEngine;
use crate::{OrchestratorError, Result, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tasks running at the same time
    pub max_concurrent_tasks: usize,

    /// Submitted tasks waiting for a worker
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            queue_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 || self.queue_capacity == 0 {
            return Err(OrchestratorError::Config(
                "workers.max_concurrent_tasks and workers.queue_capacity must be at least 1"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Fire-and-forget task runner with backpressure
pub struct TaskScheduler {
    sender: mpsc::Sender<String>,
    capacity: usize,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Spawn the dispatcher; must be called inside a tokio runtime
    pub fn start(engine: Arc<TaskExecutionEngine>, config: SchedulerConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));

        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            queue_capacity = capacity,
            "Task scheduler started"
        );

        let dispatcher = tokio::spawn(dispatch(engine, receiver, permits, shutdown.clone()));

        Self {
            sender,
            capacity,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a pending task for execution
    pub fn submit(&self, task_id: &str) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShuttingDown);
        }

        self.sender
            .try_send(task_id.to_string())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(task_id = %task_id, capacity = self.capacity, "Task queue full");
                    OrchestratorError::QueueFull(self.capacity)
                }
                mpsc::error::TrySendError::Closed(_) => OrchestratorError::ShuttingDown,
            })?;

        debug!(task_id = %task_id, "Task queued");
        Ok(())
    }

    /// Stop accepting work and wait for running tasks to finish
    ///
    /// Tasks still waiting in the queue stay pending and can be started
    /// again later.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Task dispatcher panicked");
            }
        }
        info!("Task scheduler stopped");
    }
}

async fn dispatch(
    engine: Arc<TaskExecutionEngine>,
    mut receiver: mpsc::Receiver<String>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
) {
    let mut running: JoinSet<(String, Result<TaskStatus>)> = JoinSet::new();

    loop {
        let task_id = tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(joined) = running.join_next(), if !running.is_empty() => {
                log_outcome(joined);
                continue;
            }
            next = receiver.recv() => match next {
                Some(task_id) => task_id,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let engine = engine.clone();
        running.spawn(async move {
            let _permit = permit;
            let outcome = engine.execute(&task_id).await;
            (task_id, outcome)
        });
    }

    receiver.close();
    if !running.is_empty() {
        info!(in_flight = running.len(), "Waiting for running tasks to finish");
    }
    while let Some(joined) = running.join_next().await {
        log_outcome(joined);
    }
}

fn log_outcome(joined: std::result::Result<(String, Result<TaskStatus>), JoinError>) {
    match joined {
        Ok((task_id, Ok(status))) => {
            info!(task_id = %task_id, status = %status, "Task finished");
        }
        Ok((task_id, Err(e))) => {
            warn!(task_id = %task_id, error = %e, "Task could not be executed");
        }
        Err(e) => {
            error!(error = %e, "Task worker panicked");
        }
    }
}
