
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "retrieval-qa";

/// Upper bound on `ollama.retry_attempts`
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub answerer: AnswererConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks joined into the answerer's context
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    /// Total attempts per request; 1 disables retrying
    pub retry_attempts: u32,
    /// Expected embedding dimension, checked against the first batch
    pub embedding_dimension: Option<usize>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm".to_string(),
            batch_size: 16,
            timeout_seconds: 60,
            retry_attempts: 1,
            embedding_dimension: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswererKind {
    /// Built-in sentence extractor, needs no model
    #[default]
    Lexical,
    /// Remote extractive question-answering endpoint
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnswererConfig {
    pub kind: AnswererKind,
    pub endpoint: Option<String>,
    /// Name of the environment variable holding a bearer token
    pub api_token_env: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            kind: AnswererKind::Lexical,
            endpoint: None,
            api_token_env: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Web,
    Confluence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Page to scrape, or the Confluence base URL
    pub url: String,
    pub user_agent: String,
    pub fetch_timeout_seconds: u64,
    pub confluence: ConfluenceConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Web,
            url: "https://en.wikipedia.org/wiki/Sherlock_Holmes".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            fetch_timeout_seconds: 30,
            confluence: ConfluenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub space_key: Option<String>,
    pub username: Option<String>,
    /// Name of the environment variable holding the API token
    pub api_token_env: String,
    pub page_limit: u32,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            space_key: None,
            username: None,
            api_token_env: "CONFLUENCE_API_TOKEN".to_string(),
            page_limit: 100,
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
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid window size: {0} (must be between 1 and 8192)")]
    InvalidWindowSize(usize),
    #[error("Invalid stride: {0} (must be greater than 0)")]
    InvalidStride(usize),
    #[error("Stride ({0}) must not exceed window size ({1})")]
    StrideExceedsWindow(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid page limit: {0} (must be between 1 and 500)")]
    InvalidPageLimit(u32),
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, falling back to defaults when
    /// the file does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

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

    /// Platform configuration directory for this application
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server_config()?;
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;
        self.ollama.validate()?;
        self.answerer.validate()?;
        self.source.validate()?;
        Ok(())
    }

    fn validate_server_config(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::MissingSetting("server.host"));
        }
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(1..=8192).contains(&config.window_size) {
            return Err(ConfigError::InvalidWindowSize(config.window_size));
        }

        if config.stride == 0 {
            return Err(ConfigError::InvalidStride(config.stride));
        }

        // A stride past the window would leave text that no chunk covers
        if config.stride > config.window_size {
            return Err(ConfigError::StrideExceedsWindow(
                config.stride,
                config.window_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        Ok(())
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

        let url = self.ollama_url()?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=MAX_RETRY_ATTEMPTS).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        if let Some(dimension) = self.embedding_dimension {
            if !(1..=8192).contains(&dimension) {
                return Err(ConfigError::InvalidEmbeddingDimension(dimension));
            }
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl AnswererConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if self.kind == AnswererKind::Http {
            let endpoint = self
                .endpoint
                .as_deref()
                .ok_or(ConfigError::MissingSetting("answerer.endpoint"))?;
            parse_http_url(endpoint)?;
        }

        Ok(())
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url(&self.url)?;

        if !(1..=600).contains(&self.fetch_timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.fetch_timeout_seconds));
        }

        if self.kind == SourceKind::Confluence {
            let confluence = &self.confluence;
            if confluence.space_key.as_deref().is_none_or(|s| s.trim().is_empty()) {
                return Err(ConfigError::MissingSetting("source.confluence.space_key"));
            }
            if confluence.username.as_deref().is_none_or(|s| s.trim().is_empty()) {
                return Err(ConfigError::MissingSetting("source.confluence.username"));
            }
            if !(1..=500).contains(&confluence.page_limit) {
                return Err(ConfigError::InvalidPageLimit(confluence.page_limit));
            }
        }

        Ok(())
    }
}

fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}
