//! Server configuration for drama-server
//!
//! Loads `drama-server.toml`. Every section has defaults, so an empty file
//! (or no file at all) yields a runnable local setup.

use crate::execution::SchedulerConfig;
use crate::executor::ExecutorConfig;
use crate::llm::LlmConfig;
use crate::pipelines::PromptSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Listener and identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfoConfig {
    /// Name reported by the health endpoint
    pub name: String,
    pub host: String,
    pub port: u16,

    /// Origins allowed by CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            name: "drama-server".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/drama.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Upload storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for stored uploads; novels land in `<upload_dir>/novels`
    pub upload_dir: PathBuf,

    /// Largest accepted upload
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn novel_dir(&self) -> PathBuf {
        self.upload_dir.join("novels")
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerInfoConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub workers: SchedulerConfig,
    pub executor: ExecutorConfig,
    pub llm: LlmConfig,
    pub prompts: PromptSettings,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(ServerConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ServerConfigError> {
        toml::from_str(content).map_err(ServerConfigError::ParseError)
    }

    /// Load configuration from the default location
    ///
    /// Searches, in order:
    /// 1. CONFIG_PATH environment variable
    /// 2. ./config/drama-server.toml
    /// 3. ../config/drama-server.toml (for development)
    /// 4. ./drama-server.toml
    ///
    /// Falls back to defaults when none exists. Environment overrides are
    /// applied afterwards and the result is validated.
    pub fn load() -> Result<Self, ServerConfigError> {
        let mut config = match Self::locate() {
            Some(path) => Self::from_file(path)?,
            None => {
                warn!("No drama-server.toml found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(config_path));
        }

        [
            PathBuf::from("config/drama-server.toml"),
            PathBuf::from("../config/drama-server.toml"),
            PathBuf::from("./drama-server.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Apply environment overrides; `lookup` returns the value of a variable
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DRAMA_LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup("DRAMA_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("DRAMA_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid PORT override"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        self.workers
            .validate()
            .and_then(|_| self.executor.validate())
            .map_err(|e| ServerConfigError::InvalidConfig(e.to_string()))?;

        if self.storage.max_upload_bytes == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "storage.max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(ServerConfigError::InvalidConfig(
                "database.path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get database URL from configuration
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.database.path)
    }

    /// Address the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
