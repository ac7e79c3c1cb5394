//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use drama_orchestrator::db::{DatabaseConnection, DramaStore, SqliteDramaStore};
use drama_orchestrator::document::FileParser;
use drama_orchestrator::executor::{ExecutorConfig, RetryConfig};
use drama_orchestrator::llm::TextGenerator;
use drama_orchestrator::pipelines::{build_engine, PipelineDeps, PromptSettings};
use drama_orchestrator::{OrchestratorError, Result, TaskController, TaskExecutionEngine, TaskStatus};

/// Generator that answers from a script and records every prompt
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// `Err` entries become `AiInvocation` failures
    pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Same reply forever
    pub fn repeating(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        _system_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        self.prompts.lock().unwrap().push(prompt.to_string());

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(OrchestratorError::AiInvocation(e)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| OrchestratorError::AiInvocation("script exhausted".to_string())),
        }
    }
}

/// Novel-parse round reply with `count` episodes starting at `first`
pub fn episodes_reply(first: i64, count: i64, has_more: bool) -> String {
    let episodes: Vec<serde_json::Value> = (first..first + count)
        .map(|n| {
            serde_json::json!({
                "number": n,
                "title": format!("Episode {}: chapter {}", n, n),
                "conflict": format!("conflict {}", n),
                "visuals": ["rain on the pier"],
                "dialogues": [{"role": "Mei", "line": "Not again."}],
                "hook": "a letter arrives",
                "fullScript": format!("[Conflict] conflict {}", n),
            })
        })
        .collect();
    let body = serde_json::json!({
        "episodes": episodes,
        "hasMore": has_more,
        "processedCount": count,
    });
    format!("Here is the plan:\n```json\n{}\n```", body)
}

/// Test retry policy: three attempts, no sleeping
pub fn fast_executor() -> ExecutorConfig {
    ExecutorConfig::default().with_retry(RetryConfig::immediate(3))
}

/// Everything a pipeline test needs, backed by an in-memory database
pub struct Harness {
    pub db: DatabaseConnection,
    pub controller: Arc<TaskController>,
    pub store: Arc<dyn DramaStore>,
    pub engine: TaskExecutionEngine,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_executor(generator, fast_executor()).await
    }

    pub async fn with_executor(generator: Arc<dyn TextGenerator>, executor: ExecutorConfig) -> Self {
        let db = DatabaseConnection::in_memory().await.unwrap();
        let store: Arc<dyn DramaStore> = Arc::new(SqliteDramaStore::new(db.clone()));
        Self::with_store(db, store, generator, executor)
    }

    pub fn with_store(
        db: DatabaseConnection,
        store: Arc<dyn DramaStore>,
        generator: Arc<dyn TextGenerator>,
        executor: ExecutorConfig,
    ) -> Self {
        let controller = Arc::new(TaskController::new(db.clone()));
        let engine = build_engine(
            controller.clone(),
            PipelineDeps {
                generator,
                parser: Arc::new(FileParser::new()),
                store: store.clone(),
                executor,
                prompts: PromptSettings::default(),
            },
        );

        Self {
            db,
            controller,
            store,
            engine,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write a novel into the temp dir and return its path
    pub fn write_novel(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }
}

/// Poll until the task reaches `status`; panics after two seconds
pub async fn wait_for_status(controller: &TaskController, task_id: &str, status: TaskStatus) {
    for _ in 0..200 {
        let task = controller.get_task(task_id).await.unwrap();
        if task.status().unwrap() == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let task = controller.get_task(task_id).await.unwrap();
    panic!("task {} stuck in {} (wanted {})", task_id, task.status, status);
}
