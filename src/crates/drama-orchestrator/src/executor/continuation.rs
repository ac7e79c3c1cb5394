//! Round/continuation driver
//!
//! One generate phase is a sequence of rounds. Each round sends a prompt,
//! extracts a payload and appends its units to the accumulator; the payload's
//! `hasMore` flag decides whether another round follows with the continue
//! prompt. Inside a round, invocation and extraction failures share one
//! attempt budget.

use super::config::ExecutorConfig;
use super::extractor::extract;
use crate::llm::TextGenerator;
use crate::{OrchestratorError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lower edge of the generate phase's progress band
pub const GENERATE_BAND_START: i64 = 20;

/// Width of the generate phase's progress band
pub const GENERATE_BAND_WIDTH: i64 = 60;

/// Structured payload returned by one round
pub trait ContinuationPayload: DeserializeOwned + Send {
    type Unit: Send;

    /// Whether the collaborator has more output for another round
    fn has_more(&self) -> bool;

    fn into_units(self) -> Vec<Self::Unit>;
}

/// Receives round progress and answers cancellation queries
#[async_trait]
pub trait RoundObserver: Send + Sync {
    /// Consulted before every attempt
    async fn is_cancelled(&self) -> Result<bool>;

    /// Called after each successful round
    async fn on_round_complete(&self, round: u32, processed: usize, progress: i64) -> Result<()>;
}

/// Progress after `processed` units: approaches 80 asymptotically
pub fn round_progress(processed: usize) -> i64 {
    let n = processed as i64;
    let step = (GENERATE_BAND_WIDTH * n / (n + 20)).min(GENERATE_BAND_WIDTH);
    (GENERATE_BAND_START + step).clamp(
        GENERATE_BAND_START,
        GENERATE_BAND_START + GENERATE_BAND_WIDTH,
    )
}

/// Prompts for one generate phase
#[derive(Debug, Clone, Copy)]
pub struct RoundPrompts<'a> {
    pub initial: &'a str,
    pub continuation: &'a str,
    pub system: &'a str,
}

/// Drives a generator through retried, continued rounds
pub struct RoundDriver {
    generator: Arc<dyn TextGenerator>,
    config: ExecutorConfig,
}

impl RoundDriver {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ExecutorConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run rounds until a payload reports `hasMore = false`
    ///
    /// # Returns
    /// Every unit from every round, in order
    ///
    /// # Errors
    /// * `AiInvocation` / `Extraction` once a round runs out of attempts
    /// * `ContinuationLimitExceeded` after `max_rounds` rounds that all asked
    ///   for more
    /// * `Cancelled` when the observer or token reports cancellation
    pub async fn run<P: ContinuationPayload>(
        &self,
        prompts: RoundPrompts<'_>,
        observer: &dyn RoundObserver,
        cancel: &CancellationToken,
    ) -> Result<Vec<P::Unit>> {
        let mut units = Vec::new();
        let mut prompt = prompts.initial;

        for round in 1..=self.config.max_rounds {
            let payload: P = self
                .run_round(round, prompt, prompts.system, observer, cancel)
                .await?;

            let has_more = payload.has_more();
            units.extend(payload.into_units());
            let progress = round_progress(units.len());

            info!(round, processed = units.len(), has_more, progress, "Round complete");
            observer
                .on_round_complete(round, units.len(), progress)
                .await?;

            if !has_more {
                return Ok(units);
            }
            prompt = prompts.continuation;
        }

        error!(
            max_rounds = self.config.max_rounds,
            processed = units.len(),
            "Collaborator still reports more output after round limit"
        );
        Err(OrchestratorError::ContinuationLimitExceeded(
            self.config.max_rounds,
        ))
    }

    /// One round: attempt until a payload is extracted or the budget is spent
    async fn run_round<P: DeserializeOwned>(
        &self,
        round: u32,
        prompt: &str,
        system_prompt: &str,
        observer: &dyn RoundObserver,
        cancel: &CancellationToken,
    ) -> Result<P> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if cancel.is_cancelled() || observer.is_cancelled().await? {
                info!(round, attempt, "Cancellation observed before attempt");
                return Err(OrchestratorError::Cancelled);
            }

            debug!(round, attempt, "Invoking generator");
            let outcome = match self
                .generator
                .generate_text(prompt, system_prompt, cancel)
                .await
            {
                Ok(text) => extract::<P>(&text),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(payload) => {
                    if attempt > 1 {
                        info!(round, attempt, "Round succeeded after retry");
                    }
                    return Ok(payload);
                }
                Err(e) if e.is_retryable() && self.config.retry.allows_retry_after(attempt) => {
                    let delay = self.config.retry.backoff_delay(attempt);
                    warn!(
                        round,
                        attempt,
                        max_attempts = self.config.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Round attempt failed, retrying"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                    }
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(round, attempt, error = %e, "Round attempts exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
