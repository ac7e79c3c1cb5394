//! Scene background extraction pipeline
//!
//! Reads an episode's script, asks the model for the distinct empty sets it
//! needs in a single round, and replaces the episode's scenes with them.

use super::prompts::{background_prompt, PromptSettings, BACKGROUND_SYSTEM_PROMPT};
use crate::db::{DramaStore, NewScene};
use crate::execution::{Phase, Pipeline, PipelineContext, PipelineOutcome};
use crate::executor::{ContinuationPayload, RoundDriver, RoundPrompts};
use crate::{OrchestratorError, Result, TaskKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Stored input of a background-extraction task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundInput {
    pub episode_id: i64,
}

/// Resource reference for an episode
pub fn episode_ref(episode_id: i64) -> String {
    format!("episode:{}", episode_id)
}

/// One background the model proposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBackground {
    pub location: String,
    #[serde(default)]
    pub time: String,
    pub prompt: String,
}

/// Array payload; scene extraction never continues
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SceneBatch(pub Vec<SceneBackground>);

impl ContinuationPayload for SceneBatch {
    type Unit = SceneBackground;

    fn has_more(&self) -> bool {
        false
    }

    fn into_units(self) -> Vec<SceneBackground> {
        self.0
    }
}

/// Episode script to scene backgrounds
pub struct BackgroundExtractionPipeline {
    driver: RoundDriver,
    store: Arc<dyn DramaStore>,
    settings: PromptSettings,
}

impl BackgroundExtractionPipeline {
    pub fn new(driver: RoundDriver, store: Arc<dyn DramaStore>, settings: PromptSettings) -> Self {
        Self {
            driver,
            store,
            settings,
        }
    }
}

#[async_trait]
impl Pipeline for BackgroundExtractionPipeline {
    fn kind(&self) -> TaskKind {
        TaskKind::BackgroundExtraction
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<PipelineOutcome> {
        ctx.enter_phase(Phase::Prepare).await?;
        let input: BackgroundInput = ctx.input()?;
        let episode = self
            .store
            .get_episode(input.episode_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::ResourceNotFound(episode_ref(input.episode_id))
            })?;
        let script = episode
            .script_content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                OrchestratorError::Validation(format!("episode {} has no script", episode.id))
            })?;

        ctx.enter_phase(Phase::Generate).await?;
        let prompt = background_prompt(script, &self.settings);
        let prompts = RoundPrompts {
            initial: &prompt,
            continuation: &prompt,
            system: BACKGROUND_SYSTEM_PROMPT,
        };
        let backgrounds = self
            .driver
            .run::<SceneBatch>(prompts, ctx, ctx.cancellation_token())
            .await?;

        ctx.enter_phase(Phase::Persist).await?;
        let scenes: Vec<NewScene> = backgrounds
            .into_iter()
            .map(|b| NewScene {
                location: b.location,
                time: b.time,
                prompt: b.prompt,
            })
            .collect();
        let saved = self
            .store
            .replace_scenes(episode.drama_id, episode.id, scenes)
            .await?;

        let summary: Vec<_> = saved
            .iter()
            .map(|s| json!({"scene_id": s.id, "location": s.location, "time": s.time}))
            .collect();

        Ok(PipelineOutcome {
            resource_ref: Some(episode_ref(episode.id)),
            result: json!({
                "episode_id": episode.id,
                "drama_id": episode.drama_id,
                "scene_count": saved.len(),
                "scenes": summary,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::extract;

    #[test]
    fn test_scene_batch_from_array() {
        let raw = r#"[
            {"location": "harbor", "time": "night", "prompt": "empty harbor at night, no people"},
            {"location": "tea house", "prompt": "empty tea house, no people"}
        ]"#;
        let batch: SceneBatch = extract(raw).unwrap();
        assert!(!batch.has_more());

        let scenes = batch.into_units();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].time, "");
    }

    #[test]
    fn test_object_is_rejected() {
        assert!(extract::<SceneBatch>(r#"{"location": "harbor"}"#).is_err());
    }
}
