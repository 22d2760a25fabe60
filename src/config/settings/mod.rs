#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
const HOME_ENV_VAR: &str = "STUDY_HELPER_HOME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub quiz: QuizSettings,
    #[serde(default)]
    pub summary: SummarySettings,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    /// Prepended to document text so task-aware models embed in retrieval-document mode
    pub document_prefix: String,
    /// Prepended to questions so task-aware models embed in retrieval-query mode
    pub query_prefix: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            document_prefix: "search_document: ".to_string(),
            query_prefix: "search_query: ".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestionConfig {
    /// Maximum number of embedding requests in flight for one document
    pub embedding_concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            embedding_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuizSettings {
    pub default_questions: u32,
    pub default_difficulty: String,
    pub max_prompt_chars: usize,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            default_questions: 10,
            default_difficulty: "medium".to_string(),
            max_prompt_chars: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SummarySettings {
    pub max_prompt_chars: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            max_prompt_chars: 10000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Invalid embedding concurrency: {0} (must be between 1 and 16)")]
    InvalidConcurrency(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid default question count: {0} (must be between 1 and 50)")]
    InvalidQuestionCount(u32),
    #[error("Invalid prompt length limit: {0} (must be between 500 and 100000)")]
    InvalidPromptLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            ingestion: IngestionConfig::default(),
            retrieval: RetrievalConfig::default(),
            quiz: QuizSettings::default(),
            summary: SummarySettings::default(),
            base_dir: Self::config_dir().unwrap_or_else(|_| PathBuf::from(".study-helper")),
        }
    }
}

impl Config {
    /// Directory holding `config.toml`, the SQLite database and the vector store.
    /// `STUDY_HELPER_HOME` takes precedence over `~/.study-helper`.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::home_dir()
            .map(|home| home.join(".study-helper"))
            .or_else(|| dirs::data_dir().map(|data| data.join("study-helper")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load the configuration from the default directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to locate configuration directory")?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if !(100..=8192).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }

        if !(1..=16).contains(&self.ingestion.embedding_concurrency) {
            return Err(ConfigError::InvalidConcurrency(
                self.ingestion.embedding_concurrency,
            ));
        }

        if !(1..=50).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if !(1..=50).contains(&self.quiz.default_questions) {
            return Err(ConfigError::InvalidQuestionCount(
                self.quiz.default_questions,
            ));
        }

        for limit in [self.quiz.max_prompt_chars, self.summary.max_prompt_chars] {
            if !(500..=100_000).contains(&limit) {
                return Err(ConfigError::InvalidPromptLimit(limit));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("metadata.db")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}
