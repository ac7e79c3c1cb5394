//! Concrete pipelines and the engine wiring that registers them

pub mod background;
pub mod novel_parse;
pub mod prompts;

use crate::db::DramaStore;
use crate::document::DocumentParser;
use crate::execution::{TaskController, TaskExecutionEngine};
use crate::executor::{ExecutorConfig, RoundDriver};
use crate::llm::TextGenerator;
use std::sync::Arc;

pub use background::{BackgroundExtractionPipeline, BackgroundInput};
pub use novel_parse::{NovelParseInput, NovelParsePipeline};
pub use prompts::PromptSettings;

/// Collaborators shared by every pipeline
#[derive(Clone)]
pub struct PipelineDeps {
    pub generator: Arc<dyn TextGenerator>,
    pub parser: Arc<dyn DocumentParser>,
    pub store: Arc<dyn DramaStore>,
    pub executor: ExecutorConfig,
    pub prompts: PromptSettings,
}

/// Engine with the novel-parse and background-extraction pipelines
pub fn build_engine(controller: Arc<TaskController>, deps: PipelineDeps) -> TaskExecutionEngine {
    let novel = NovelParsePipeline::new(
        deps.parser.clone(),
        RoundDriver::new(deps.generator.clone(), deps.executor.clone()),
        deps.store.clone(),
    );
    let backgrounds = BackgroundExtractionPipeline::new(
        RoundDriver::new(deps.generator, deps.executor),
        deps.store,
        deps.prompts,
    );

    TaskExecutionEngine::new(controller)
        .with_pipeline(Arc::new(novel))
        .with_pipeline(Arc::new(backgrounds))
}
