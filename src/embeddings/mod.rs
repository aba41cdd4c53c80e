// Embeddings module
// Text to vector conversion used by both ingestion and the query path

pub mod ollama;

use anyhow::{Result, anyhow};

pub use crate::index::Embedding;
pub use ollama::OllamaClient;

/// A text embedding model.
///
/// Implementations must be deterministic for identical input and return
/// vectors of one fixed dimension.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Make sure the model is reachable and usable.
    fn load(&self) -> Result<()> {
        Ok(())
    }

    /// Embed a single text.
    fn encode_one(&self, text: &str) -> Result<Embedding> {
        self.encode(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedding model returned no vectors"))
    }
}
