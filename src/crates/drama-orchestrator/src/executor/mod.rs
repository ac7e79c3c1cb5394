//! Generation Execution Module
//!
//! Drives the text-generation collaborator through retried, continued rounds
//! and extracts structured payloads from its output.

pub mod config;
pub mod continuation;
pub mod extractor;
pub mod retry;

pub use config::ExecutorConfig;
pub use continuation::{round_progress, ContinuationPayload, RoundDriver, RoundObserver, RoundPrompts};
pub use extractor::{extract, locate_payload};
pub use retry::RetryConfig;
