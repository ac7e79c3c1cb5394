//! Novel parsing pipeline
//!
//! Prepare reads the uploaded document, Generate asks the model for episodes
//! round by round, Persist writes them under a new or existing drama.

use super::prompts::{NOVEL_PARSE_CONTINUE_PROMPT, NOVEL_PARSE_SYSTEM_PROMPT};
use crate::db::{DramaStore, NewEpisode};
use crate::document::DocumentParser;
use crate::execution::{Phase, Pipeline, PipelineContext, PipelineOutcome};
use crate::executor::{ContinuationPayload, RoundDriver, RoundPrompts};
use crate::{OrchestratorError, Result, TaskKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Description given to dramas created from an upload
pub const IMPORTED_DRAMA_DESCRIPTION: &str = "imported from novel file";

/// Stored input of a novel-parse task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelParseInput {
    /// Where the upload was saved
    pub file_path: String,

    /// Name the file was uploaded under
    pub file_name: String,

    /// Existing drama to append episodes to
    #[serde(default)]
    pub drama_id: Option<i64>,

    /// Title for a newly created drama; defaults to the file stem
    #[serde(default)]
    pub title: Option<String>,
}

impl NovelParseInput {
    fn drama_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => Path::new(&self.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled")
                .to_string(),
        }
    }
}

/// A line of dialogue in an episode plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDialogue {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub line: String,
}

/// One episode as the model describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelEpisode {
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub conflict: String,
    #[serde(default)]
    pub visuals: Vec<String>,
    #[serde(default)]
    pub dialogues: Vec<EpisodeDialogue>,
    #[serde(default)]
    pub hook: String,
    #[serde(rename = "fullScript", default)]
    pub full_script: String,
}

impl NovelEpisode {
    /// Script text to store: `fullScript` when present, otherwise rebuilt
    /// from the structured fields
    pub fn script(&self) -> String {
        if !self.full_script.trim().is_empty() {
            return self.full_script.clone();
        }

        let mut sections = Vec::new();
        if !self.conflict.is_empty() {
            sections.push(format!("[Conflict] {}", self.conflict));
        }
        if !self.visuals.is_empty() {
            sections.push(format!("[Visuals] {}", self.visuals.join("\n")));
        }
        if !self.dialogues.is_empty() {
            let lines: Vec<String> = self
                .dialogues
                .iter()
                .map(|d| format!("{}: {}", d.role, d.line))
                .collect();
            sections.push(format!("[Dialogue] {}", lines.join("\n")));
        }
        if !self.hook.is_empty() {
            sections.push(format!("[Hook] {}", self.hook));
        }
        sections.join("\n")
    }
}

/// Payload of one novel-parse round
#[derive(Debug, Clone, Deserialize)]
pub struct NovelParseRound {
    pub episodes: Vec<NovelEpisode>,

    #[serde(rename = "hasMore", default)]
    pub has_more: bool,

    /// Model's own count for the round; informational only
    #[serde(rename = "processedCount", default)]
    pub processed_count: usize,
}

impl ContinuationPayload for NovelParseRound {
    type Unit = NovelEpisode;

    fn has_more(&self) -> bool {
        self.has_more
    }

    fn into_units(self) -> Vec<NovelEpisode> {
        self.episodes
    }
}

/// Novel document to drama episodes
pub struct NovelParsePipeline {
    parser: Arc<dyn DocumentParser>,
    driver: RoundDriver,
    store: Arc<dyn DramaStore>,
}

impl NovelParsePipeline {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        driver: RoundDriver,
        store: Arc<dyn DramaStore>,
    ) -> Self {
        Self {
            parser,
            driver,
            store,
        }
    }

    async fn resolve_drama(&self, input: &NovelParseInput) -> Result<i64> {
        if let Some(id) = input.drama_id {
            if let Some(drama) = self.store.get_drama(id).await? {
                return Ok(drama.id);
            }
            warn!(drama_id = id, "Requested drama does not exist, creating a new one");
        }

        let drama = self
            .store
            .create_drama(&input.drama_title(), Some(IMPORTED_DRAMA_DESCRIPTION))
            .await?;
        info!(drama_id = drama.id, title = %drama.title, "Drama created");
        Ok(drama.id)
    }
}

#[async_trait]
impl Pipeline for NovelParsePipeline {
    fn kind(&self) -> TaskKind {
        TaskKind::NovelParse
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<PipelineOutcome> {
        ctx.enter_phase(Phase::Prepare).await?;
        let input: NovelParseInput = ctx.input()?;
        let content = self.parser.parse_file(Path::new(&input.file_path)).await?;
        ctx.report(
            10,
            &format!("document loaded, {} characters", content.chars().count()),
        )
        .await?;

        ctx.enter_phase(Phase::Generate).await?;
        let prompts = RoundPrompts {
            initial: &content,
            continuation: NOVEL_PARSE_CONTINUE_PROMPT,
            system: NOVEL_PARSE_SYSTEM_PROMPT,
        };
        let episodes = self
            .driver
            .run::<NovelParseRound>(prompts, ctx, ctx.cancellation_token())
            .await?;

        if episodes.is_empty() {
            return Err(OrchestratorError::extraction(
                "model returned no episodes",
                None,
            ));
        }

        ctx.enter_phase(Phase::Persist).await?;
        let drama_id = self.resolve_drama(&input).await?;

        // batch positions; the store appends them after any existing episodes
        let new_episodes: Vec<NewEpisode> = episodes
            .iter()
            .enumerate()
            .map(|(idx, ep)| {
                let number = idx as i64 + 1;
                NewEpisode {
                    episode_number: number,
                    title: if ep.title.trim().is_empty() {
                        format!("Episode {}", number)
                    } else {
                        ep.title.clone()
                    },
                    script_content: ep.script(),
                }
            })
            .collect();

        let created = self.store.add_episodes(drama_id, new_episodes).await?;
        ctx.report(95, &format!("{} episodes saved", created.len()))
            .await?;

        let summary: Vec<_> = created
            .iter()
            .map(|ep| {
                json!({
                    "episode_id": ep.id,
                    "episode_number": ep.episode_number,
                    "title": ep.title,
                })
            })
            .collect();

        Ok(PipelineOutcome {
            resource_ref: Some(format!("drama:{}", drama_id)),
            result: json!({
                "drama_id": drama_id,
                "total_episodes": episodes.len(),
                "created_episodes": created.len(),
                "episodes": summary,
            }),
        })
    }
}
