//! Configuration for the drama server
//!
//! TOML server configuration with environment overrides. Component settings
//! (`SchedulerConfig`, `ExecutorConfig`, `LlmConfig`, `PromptSettings`) live
//! next to the code they configure and are embedded here as sections.

pub mod server;

pub use server::{DatabaseConfig, ServerConfig, ServerConfigError, ServerInfoConfig, StorageConfig};
