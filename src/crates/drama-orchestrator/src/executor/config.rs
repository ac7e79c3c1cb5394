//! Round driver configuration

use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};

use super::retry::RetryConfig;

/// Configuration for generation rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Retry policy applied to each round
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upper bound on continuation rounds per generate phase
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_max_rounds() -> u32 {
    50
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl ExecutorConfig {
    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the round limit
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(OrchestratorError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.max_rounds == 0 {
            return Err(OrchestratorError::Config(
                "max_rounds must be at least 1".to_string(),
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(OrchestratorError::Config(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        Ok(())
    }
}
