//! Pipeline contract and per-run context
//!
//! A pipeline runs three phases (prepare, generate, persist) for one task
//! kind. It reports progress and checks cancellation through the
//! [`PipelineContext`] it is handed; it never writes the task record itself.

use super::controller::TaskController;
use crate::db::models::TaskRecord;
use crate::executor::RoundObserver;
use crate::{OrchestratorError, Result, TaskKind, TaskStatus};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed pipeline stage with its progress band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Generate,
    Persist,
}

impl Phase {
    /// Progress at the start and end of the phase
    pub fn progress_band(&self) -> (i64, i64) {
        match self {
            Phase::Prepare => (0, 20),
            Phase::Generate => (20, 80),
            Phase::Persist => (80, 100),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Generate => "generate",
            Phase::Persist => "persist",
        }
    }

    fn from_index(index: u8) -> Self {
        match index {
            0 => Phase::Prepare,
            1 => Phase::Generate,
            _ => Phase::Persist,
        }
    }

    fn index(&self) -> u8 {
        match self {
            Phase::Prepare => 0,
            Phase::Generate => 1,
            Phase::Persist => 2,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful pipeline run hands back to the engine
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Domain object the run produced, e.g. "drama:12"
    pub resource_ref: Option<String>,

    /// Summary stored as the task result
    pub result: serde_json::Value,
}

/// Per-kind phase sequence
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn run(&self, ctx: &PipelineContext) -> Result<PipelineOutcome>;
}

/// Handle a running pipeline uses to talk to the lifecycle controller
pub struct PipelineContext {
    task: TaskRecord,
    controller: Arc<TaskController>,
    cancel: CancellationToken,
    phase: AtomicU8,
}

impl PipelineContext {
    pub fn new(task: TaskRecord, controller: Arc<TaskController>, cancel: CancellationToken) -> Self {
        Self {
            task,
            controller,
            cancel,
            phase: AtomicU8::new(Phase::Prepare.index()),
        }
    }

    pub fn task(&self) -> &TaskRecord {
        &self.task
    }

    pub fn task_id(&self) -> &str {
        &self.task.task_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Phase currently running
    pub fn phase(&self) -> Phase {
        Phase::from_index(self.phase.load(Ordering::Acquire))
    }

    /// Decode the task input into the pipeline's input type
    pub fn input<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.task.input.as_deref().ok_or_else(|| {
            OrchestratorError::Validation(format!("task {} has no input", self.task.task_id))
        })?;
        serde_json::from_str(raw).map_err(|e| {
            OrchestratorError::Validation(format!("invalid task input: {}", e))
        })
    }

    /// Check cancellation, then move to `phase` at the start of its band
    pub async fn enter_phase(&self, phase: Phase) -> Result<()> {
        self.ensure_not_cancelled().await?;
        self.phase.store(phase.index(), Ordering::Release);

        let (start, _) = phase.progress_band();
        debug!(task_id = %self.task_id(), phase = %phase, "Entering phase");
        self.report(start, &format!("{} phase started", phase)).await
    }

    /// Write running progress; a task cancelled meanwhile yields `Cancelled`
    pub async fn report(&self, progress: i64, message: &str) -> Result<()> {
        match self
            .controller
            .update_status(self.task_id(), TaskStatus::Running, progress, message)
            .await
        {
            Err(OrchestratorError::InvalidStateTransition {
                from: TaskStatus::Cancelled,
                ..
            }) => Err(OrchestratorError::Cancelled),
            other => other,
        }
    }

    /// `Err(Cancelled)` once the task was cancelled by token or by record
    pub async fn ensure_not_cancelled(&self) -> Result<()> {
        if self.check_cancelled().await? {
            return Err(OrchestratorError::Cancelled);
        }
        Ok(())
    }

    async fn check_cancelled(&self) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Ok(true);
        }
        self.controller.is_cancelled(self.task_id()).await
    }
}

#[async_trait]
impl RoundObserver for PipelineContext {
    async fn is_cancelled(&self) -> Result<bool> {
        self.check_cancelled().await
    }

    async fn on_round_complete(&self, round: u32, processed: usize, progress: i64) -> Result<()> {
        self.report(
            progress,
            &format!("round {} done, {} items generated", round, processed),
        )
        .await
    }
}
