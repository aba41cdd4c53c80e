use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Service not ready: {0}")]
    NotReady(String),

    #[error("Initialization already ran (status {0})")]
    AlreadyInitialized(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Knowledge base inconsistency: {0}")]
    Consistency(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod knowledge;
pub mod server;
pub mod service;
pub mod source;

#[cfg(test)]
mod test_support;
