// Configuration management module
// TOML configuration file with one table per component

pub mod settings;


pub use settings::{
    AnswererConfig, AnswererKind, Config, ConfigError, ConfluenceConfig, MAX_RETRY_ATTEMPTS,
    OllamaConfig, RetrievalConfig, ServerConfig, SourceConfig, SourceKind,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
