
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{QaError, Result};

pub const DEFAULT_WINDOW_SIZE: usize = 512;
pub const DEFAULT_STRIDE: usize = 384;

/// Configuration for sliding-window chunking.
///
/// Sizes are counted in characters. Consecutive windows share
/// `window_size - stride` characters, which is the knob trading recall on
/// answers that straddle a boundary against index size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum length of a chunk
    pub window_size: usize,
    /// Distance between the starts of consecutive chunks
    pub stride: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            stride: DEFAULT_STRIDE,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub const fn new(window_size: usize, stride: usize) -> Self {
        Self {
            window_size,
            stride,
        }
    }

    /// Number of characters shared by two neighbouring chunks
    #[inline]
    pub const fn overlap(&self) -> usize {
        self.window_size.saturating_sub(self.stride)
    }

    /// Reject a window or stride of zero
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(QaError::InvalidConfiguration(
                "chunk stride must be greater than zero".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(QaError::InvalidConfiguration(
                "chunk window size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split `text` into windows of `window_size` characters starting every
/// `stride` characters. The final window may be shorter; nothing is padded.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::with_capacity(chunk_count(chars.len(), config)?);

    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.window_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect::<String>());
        start += config.stride;
    }

    debug!(
        "Chunked {} characters into {} chunks (window {}, stride {})",
        chars.len(),
        chunks.len(),
        config.window_size,
        config.stride
    );

    Ok(chunks)
}

/// Number of chunks [`chunk_text`] produces for a text of `len` characters.
#[inline]
pub fn chunk_count(len: usize, config: &ChunkingConfig) -> Result<usize> {
    config.validate()?;
    Ok(len.div_ceil(config.stride))
}
