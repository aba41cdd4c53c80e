//! Chunk store and vector index kept in lockstep
//!
//! The knowledge base is the only writer of both stores. Chunk `n` in the
//! store is always described by row `n` of the index; ingestion either commits
//! a document to both or to neither.


use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::embeddings::Embedder;
use crate::index::{FlatL2Index, RowId, VectorIndex};
use crate::{QaError, Result};

/// Raw text handed to ingestion, with optional provenance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub title: Option<String>,
    pub source_id: Option<String>,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[inline]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// A chunk as kept in the chunk store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredChunk {
    pub row: RowId,
    pub text: String,
    /// Title of the document the chunk came from
    pub title: Option<String>,
}

/// A chunk returned by a similarity lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievedChunk<'a> {
    pub chunk: &'a StoredChunk,
    pub distance: f32,
}

pub struct KnowledgeBase<I: VectorIndex = FlatL2Index> {
    chunks: Vec<StoredChunk>,
    index: I,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl KnowledgeBase<FlatL2Index> {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            chunks: Vec::new(),
            index: FlatL2Index::new(),
            embedder,
            chunking,
        }
    }

    /// Knowledge base whose index rejects embeddings of any other dimension
    #[inline]
    pub fn with_dimension(
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        dimension: usize,
    ) -> Self {
        Self {
            chunks: Vec::new(),
            index: FlatL2Index::with_dimension(dimension),
            embedder,
            chunking,
        }
    }
}

impl<I: VectorIndex> KnowledgeBase<I> {
    /// Build a knowledge base on top of an existing, empty index
    #[inline]
    pub fn with_index(
        index: I,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        if !index.is_empty() {
            return Err(QaError::Consistency(format!(
                "index already holds {} vectors but the chunk store is empty",
                index.len()
            )));
        }
        Ok(Self {
            chunks: Vec::new(),
            index,
            embedder,
            chunking,
        })
    }

    /// Chunk, embed and store `document`, returning the number of chunks added.
    #[inline]
    pub fn ingest(&mut self, document: &str) -> Result<usize> {
        self.ingest_text(document, None)
    }

    /// Like [`ingest`](Self::ingest), keeping the document title on each chunk.
    #[inline]
    pub fn ingest_document(&mut self, document: &Document) -> Result<usize> {
        self.ingest_text(&document.text, document.title.as_deref())
    }

    fn ingest_text(&mut self, text: &str, title: Option<&str>) -> Result<usize> {
        self.check_consistency()?;

        let texts = chunk_text(text, &self.chunking)?;
        if texts.is_empty() {
            debug!("Document {:?} produced no chunks", title);
            return Ok(0);
        }

        // Nothing is committed until every chunk has a vector.
        let embeddings = self
            .embedder
            .encode(&texts)
            .map_err(|e| QaError::IngestionFailure(format!("embedding chunks failed: {e:#}")))?;

        if embeddings.len() != texts.len() {
            return Err(QaError::IngestionFailure(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }

        self.index.add(&embeddings)?;

        let first_row = self.chunks.len();
        let added = texts.len();
        self.chunks
            .extend(texts.into_iter().enumerate().map(|(offset, text)| StoredChunk {
                row: RowId(first_row + offset),
                text,
                title: title.map(str::to_string),
            }));

        self.check_consistency()?;

        info!(
            "Added {} chunks to knowledge base ({} total)",
            added,
            self.chunks.len()
        );
        Ok(added)
    }

    /// The `k` stored chunks closest to `query`, nearest first.
    #[inline]
    pub fn retrieve_context(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk<'_>>> {
        self.check_consistency()?;

        self.index
            .search(query, k)?
            .into_iter()
            .map(|neighbor| {
                self.chunks
                    .get(neighbor.row.get())
                    .map(|chunk| RetrievedChunk {
                        chunk,
                        distance: neighbor.distance,
                    })
                    .ok_or_else(|| {
                        QaError::Consistency(format!(
                            "index returned row {} but the chunk store holds {} chunks",
                            neighbor.row,
                            self.chunks.len()
                        ))
                    })
            })
            .collect()
    }

    /// Verify that every chunk has exactly one vector.
    #[inline]
    pub fn check_consistency(&self) -> Result<()> {
        if self.chunks.len() == self.index.len() {
            Ok(())
        } else {
            Err(QaError::Consistency(format!(
                "chunk store holds {} chunks but the index holds {} vectors",
                self.chunks.len(),
                self.index.len()
            )))
        }
    }

    #[inline]
    pub fn chunk(&self, row: RowId) -> Option<&StoredChunk> {
        self.chunks.get(row.get())
    }

    #[inline]
    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn index(&self) -> &I {
        &self.index
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[inline]
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }
}

impl<I: VectorIndex> fmt::Debug for KnowledgeBase<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("chunks", &self.chunks.len())
            .field("vectors", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("chunking", &self.chunking)
            .finish_non_exhaustive()
    }
}
