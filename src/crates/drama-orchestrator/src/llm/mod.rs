//! Text-generation collaborator
//!
//! The pipelines only see [`TextGenerator`]; the server wires in the
//! OpenAI-compatible client from [`openai`].

pub mod openai;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use openai::OpenAiCompatibleClient;

/// Produces free-form text for a prompt
///
/// Calls may fail transiently and are not assumed idempotent. The token lets
/// an implementation refuse to start a call for a cancelled task; a call
/// already on the wire runs to completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// Connection settings for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// e.g. "https://api.openai.com/v1"
    pub base_url: String,

    /// Bearer token; empty means no Authorization header
    pub api_key: String,

    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub temperature: f32,

    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 300,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}
