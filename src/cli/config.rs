//! Configuration management for tutor-rag
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.tutor-rag/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{RagError, Result};
use crate::index::{BuilderOptions, ResumePolicy};

/// Complete configuration for tutor-rag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub builder: BuilderConfig,
    pub retrieval: RetrievalConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Embedding service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

/// Chat-completion service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// Index build behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Pause between embedding calls, for service rate limits
    pub delay_ms: u64,
    pub resume: ResumePolicy,
}

/// Retrieval behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Token budget for page text passed to the chat model
    pub max_context_tokens: usize,
    /// Only forward page images that exist on disk
    pub existing_images_only: bool,
}

/// Log output defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub default_level: String,
}

/// File system paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Extraction pipeline output (JSON array of pages)
    pub corpus: String,
    /// Persisted embedding index
    pub index: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-embed".to_string(),
            api_key_env: "MISTRAL_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "pixtral-12b-2409".to_string(),
            api_key_env: "MISTRAL_API_KEY".to_string(),
            timeout_secs: 60,
            max_tokens: 500,
            system_prompt: "You review a learner's worked solution to the given question. \
                            Use the reference material when it is relevant."
                .to_string(),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            resume: ResumePolicy::LastPage,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_context_tokens: 2000,
            existing_images_only: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus: "data/processed/textbook.json".to_string(),
            index: "data/processed/textbook_index.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".tutor-rag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(RagError::ConfigError(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.embedding.model.trim().is_empty() || self.chat.model.trim().is_empty() {
            return Err(RagError::ConfigError(
                "model names must not be empty".to_string(),
            ));
        }

        for (name, url) in [("embedding", &self.embedding.base_url), ("chat", &self.chat.base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(RagError::ConfigError(format!(
                    "{} base_url must be an http(s) URL: {}",
                    name, url
                )));
            }
        }

        if self.embedding.timeout_secs == 0 || self.chat.timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.paths.index.trim().is_empty() {
            return Err(RagError::ConfigError(
                "index path must not be empty".to_string(),
            ));
        }

        match self.logging.default_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(RagError::ConfigError(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RagError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RagError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Builder options derived from the `[builder]` section
    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            delay: Duration::from_millis(self.builder.delay_ms),
            resume: self.builder.resume,
        }
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn corpus_path(&self) -> PathBuf {
        Self::expand_path(&self.paths.corpus)
    }

    pub fn index_path(&self) -> PathBuf {
        Self::expand_path(&self.paths.index)
    }
}
