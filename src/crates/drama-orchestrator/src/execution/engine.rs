//! Task Execution Engine
//!
//! Runs one claimed task end to end:
//! 1. Claim the task (pending -> running)
//! 2. Look up the pipeline for its kind
//! 3. Run the pipeline phases
//! 4. Store the result, or the failure message
//!
//! Pipeline errors stop here; they become a failed task record and never
//! reach whoever triggered the run. A cancelled task is never overwritten.

use super::controller::TaskController;
use super::pipeline::{Pipeline, PipelineContext, PipelineOutcome};
use crate::{OrchestratorError, Result, TaskKind, TaskStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// Task Execution Engine
pub struct TaskExecutionEngine {
    controller: Arc<TaskController>,
    pipelines: HashMap<TaskKind, Arc<dyn Pipeline>>,
}

impl TaskExecutionEngine {
    pub fn new(controller: Arc<TaskController>) -> Self {
        Self {
            controller,
            pipelines: HashMap::new(),
        }
    }

    /// Register the pipeline for its kind, replacing any previous one
    pub fn with_pipeline(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.register(pipeline);
        self
    }

    pub fn register(&mut self, pipeline: Arc<dyn Pipeline>) {
        self.pipelines.insert(pipeline.kind(), pipeline);
    }

    pub fn controller(&self) -> &Arc<TaskController> {
        &self.controller
    }

    /// Claim and run a pending task
    ///
    /// # Returns
    /// The terminal status the task ended in
    ///
    /// # Errors
    /// Only when the claim is refused (unknown task, not pending) or the task
    /// record itself cannot be written.
    pub async fn execute(&self, task_id: &str) -> Result<TaskStatus> {
        let (task, cancel) = self.controller.claim_task(task_id).await?;
        let span = info_span!("task", task_id = %task_id, kind = %task.kind);

        async move {
            let kind = task.kind();
            let pipeline = kind
                .as_ref()
                .ok()
                .and_then(|k| self.pipelines.get(k))
                .cloned();

            let Some(pipeline) = pipeline else {
                let message = format!("no pipeline registered for task kind {}", task.kind);
                error!("{}", message);
                self.controller.update_error(task_id, &message).await?;
                return Ok(TaskStatus::Failed);
            };

            let ctx = PipelineContext::new(task, self.controller.clone(), cancel);
            info!("Pipeline started");
            let outcome = pipeline.run(&ctx).await;
            let status = self.finish(&ctx, outcome).await;

            self.controller.release(task_id);
            status
        }
        .instrument(span)
        .await
    }

    async fn finish(
        &self,
        ctx: &PipelineContext,
        outcome: Result<PipelineOutcome>,
    ) -> Result<TaskStatus> {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => return self.fail_unless_cancelled(ctx, e).await,
        };

        let stored = async {
            if let Some(resource_ref) = &outcome.resource_ref {
                self.controller
                    .attach_resource(ctx.task_id(), resource_ref)
                    .await?;
            }
            self.controller
                .update_result(ctx.task_id(), &outcome.result)
                .await
        }
        .await;

        match stored {
            Ok(()) => {
                info!(resource_ref = ?outcome.resource_ref, "Pipeline completed");
                Ok(TaskStatus::Completed)
            }
            Err(e) => self.fail_unless_cancelled(ctx, e).await,
        }
    }

    async fn fail_unless_cancelled(
        &self,
        ctx: &PipelineContext,
        err: OrchestratorError,
    ) -> Result<TaskStatus> {
        if matches!(err, OrchestratorError::Cancelled)
            || self.controller.is_cancelled(ctx.task_id()).await?
        {
            info!(phase = %ctx.phase(), "Pipeline stopped after cancellation");
            return Ok(TaskStatus::Cancelled);
        }

        let message = format!("{} phase failed: {}", ctx.phase(), err);
        error!(phase = %ctx.phase(), error_kind = err.kind(), error = %err, "Pipeline failed");

        match self.controller.update_error(ctx.task_id(), &message).await {
            Ok(()) => Ok(TaskStatus::Failed),
            // cancelled between the check above and the write
            Err(OrchestratorError::InvalidStateTransition {
                from: TaskStatus::Cancelled,
                ..
            }) => Ok(TaskStatus::Cancelled),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;
    use crate::execution::Phase;
    use async_trait::async_trait;

    struct StaticPipeline {
        fail_with: Option<fn() -> OrchestratorError>,
    }

    #[async_trait]
    impl Pipeline for StaticPipeline {
        fn kind(&self) -> TaskKind {
            TaskKind::NovelParse
        }

        async fn run(&self, ctx: &PipelineContext) -> Result<PipelineOutcome> {
            ctx.enter_phase(Phase::Prepare).await?;
            ctx.enter_phase(Phase::Generate).await?;
            ctx.report(55, "halfway").await?;
            if let Some(make_err) = self.fail_with {
                return Err(make_err());
            }
            ctx.enter_phase(Phase::Persist).await?;
            Ok(PipelineOutcome {
                resource_ref: Some("drama:1".to_string()),
                result: serde_json::json!({"total_episodes": 2}),
            })
        }
    }

    async fn engine(fail_with: Option<fn() -> OrchestratorError>) -> TaskExecutionEngine {
        let controller = Arc::new(TaskController::new(
            DatabaseConnection::in_memory().await.unwrap(),
        ));
        TaskExecutionEngine::new(controller).with_pipeline(Arc::new(StaticPipeline { fail_with }))
    }

    #[tokio::test]
    async fn test_successful_run_completes_task() {
        let engine = engine(None).await;
        let task = engine
            .controller()
            .create_task(TaskKind::NovelParse, None, None)
            .await
            .unwrap();

        let status = engine.execute(&task.task_id).await.unwrap();
        assert_eq!(status, TaskStatus::Completed);

        let task = engine.controller().get_task(&task.task_id).await.unwrap();
        assert_eq!(task.progress, 100);
        assert_eq!(task.resource_ref.as_deref(), Some("drama:1"));
        assert_eq!(task.result_json().unwrap().unwrap()["total_episodes"], 2);
        assert_eq!(engine.controller().active_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_run_records_phase_and_keeps_progress() {
        let engine = engine(Some(|| OrchestratorError::AiInvocation("503".into()))).await;
        let task = engine
            .controller()
            .create_task(TaskKind::NovelParse, None, None)
            .await
            .unwrap();

        let status = engine.execute(&task.task_id).await.unwrap();
        assert_eq!(status, TaskStatus::Failed);

        let task = engine.controller().get_task(&task.task_id).await.unwrap();
        assert_eq!(task.progress, 55);
        let message = task.error_message.unwrap();
        assert!(message.starts_with("generate phase failed"));
        assert!(message.contains("503"));
    }

    #[tokio::test]
    async fn test_second_execute_is_refused() {
        let engine = engine(None).await;
        let task = engine
            .controller()
            .create_task(TaskKind::NovelParse, None, None)
            .await
            .unwrap();

        engine.execute(&task.task_id).await.unwrap();
        assert!(matches!(
            engine.execute(&task.task_id).await,
            Err(OrchestratorError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_unregistered_kind_fails_task() {
        let engine = engine(None).await;
        let task = engine
            .controller()
            .create_task(TaskKind::BackgroundExtraction, None, None)
            .await
            .unwrap();

        let status = engine.execute(&task.task_id).await.unwrap();
        assert_eq!(status, TaskStatus::Failed);

        let task = engine.controller().get_task(&task.task_id).await.unwrap();
        assert!(task
            .error_message
            .unwrap()
            .contains("no pipeline registered"));
    }
}
