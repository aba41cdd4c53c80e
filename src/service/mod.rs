//! Service lifecycle and the question-answering path
//!
//! A [`RetrievalService`] starts in `not_started`, is driven through
//! initialization exactly once by [`RetrievalService::initialize`], and then
//! answers questions against the knowledge base it built. The knowledge base
//! is published before the `ready` snapshot, so any caller that observes
//! `ready` also observes the fully ingested stores.

pub mod state;


use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::anyhow;
use itertools::Itertools;
use tracing::{debug, error, info, warn};

use crate::answer::{Answer, Answerer};
use crate::chunking::ChunkingConfig;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::knowledge::{Document, KnowledgeBase};
use crate::source::ContentSource;
use crate::{QaError, Result};

pub use state::{InitState, StateCell, StatusSnapshot};

/// Separator placed between retrieved chunks in the answerer's context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub embedding_dimension: Option<usize>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
            embedding_dimension: None,
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            chunking: config.chunking,
            top_k: config.retrieval.top_k,
            embedding_dimension: config.ollama.embedding_dimension,
        }
    }
}

pub struct RetrievalService {
    state: StateCell,
    knowledge: OnceLock<KnowledgeBase>,
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn Answerer>,
    options: ServiceOptions,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn Answerer>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            state: StateCell::new(),
            knowledge: OnceLock::new(),
            embedder,
            answerer,
            options,
        }
    }

    #[inline]
    pub fn status(&self) -> Arc<StatusSnapshot> {
        self.state.get()
    }

    #[inline]
    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// The published knowledge base, once initialization has succeeded
    #[inline]
    pub fn knowledge(&self) -> Option<&KnowledgeBase> {
        self.knowledge.get()
    }

    /// Fetch the corpus, load the models and build the knowledge base.
    ///
    /// Drives the state to `ready` or `error`. Calling it a second time fails
    /// without changing the state.
    pub async fn initialize(
        self: Arc<Self>,
        source: Arc<dyn ContentSource>,
        fetch_timeout: Duration,
    ) -> Result<()> {
        let description = source.describe();
        let (current, moved) = self.state.set(
            InitState::Initializing,
            format!("Building knowledge base from {description}"),
        );
        if !moved {
            return Err(QaError::AlreadyInitialized(current.status.to_string()));
        }
        info!("Initializing knowledge base from {}", description);

        match Arc::clone(&self).build(source, fetch_timeout).await {
            Ok(knowledge) => {
                let chunks = knowledge.chunk_count();
                if self.knowledge.set(knowledge).is_err() {
                    let error = QaError::Consistency("knowledge base published twice".to_string());
                    self.fail(&error);
                    return Err(error);
                }
                self.state.set(
                    InitState::Ready,
                    format!("Knowledge base ready with {chunks} chunks"),
                );
                info!("Knowledge base initialized with {} chunks", chunks);
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn fail(&self, error: &QaError) {
        error!("Error initializing knowledge base: {}", error);
        self.state.set(InitState::Error, error.to_string());
    }

    async fn build(
        self: Arc<Self>,
        source: Arc<dyn ContentSource>,
        fetch_timeout: Duration,
    ) -> Result<KnowledgeBase> {
        let description = source.describe();
        let documents = tokio::time::timeout(
            fetch_timeout,
            tokio::task::spawn_blocking(move || source.fetch()),
        )
        .await
        .map_err(|_| {
            QaError::IngestionFailure(format!(
                "fetching {description} timed out after {fetch_timeout:?}"
            ))
        })?
        .map_err(|e| QaError::Other(anyhow!("fetch task failed: {e}")))?
        .map_err(|e| QaError::IngestionFailure(format!("fetching {description} failed: {e:#}")))?;

        info!("Fetched {} documents from {}", documents.len(), description);

        tokio::task::spawn_blocking(move || self.load_and_ingest(&documents))
            .await
            .map_err(|e| QaError::Other(anyhow!("ingest task failed: {e}")))?
    }

    fn load_and_ingest(&self, documents: &[Document]) -> Result<KnowledgeBase> {
        self.embedder
            .load()
            .map_err(|e| QaError::IngestionFailure(format!("embedding model failed to load: {e:#}")))?;
        self.answerer
            .load()
            .map_err(|e| QaError::IngestionFailure(format!("answer model failed to load: {e:#}")))?;

        let embedder = Arc::clone(&self.embedder);
        let mut knowledge = match self.options.embedding_dimension {
            Some(dimension) => {
                KnowledgeBase::with_dimension(embedder, self.options.chunking, dimension)
            }
            None => KnowledgeBase::new(embedder, self.options.chunking),
        };

        for document in documents {
            let added = knowledge.ingest_document(document)?;
            debug!(
                "Ingested {:?}: {} chunks",
                document.title.as_deref().unwrap_or("untitled"),
                added
            );
        }

        if knowledge.is_empty() {
            return Err(QaError::IngestionFailure(
                "source produced no text to index".to_string(),
            ));
        }
        Ok(knowledge)
    }

    /// Answer `query` from the top-k retrieved chunks.
    ///
    /// Runs the embedding and answer models on a blocking thread.
    pub async fn answer(self: &Arc<Self>, query: &str) -> Result<Answer> {
        // Checked here so a service that is not ready never schedules work
        self.ready_knowledge()?;

        let service = Arc::clone(self);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || service.answer_blocking(&query))
            .await
            .map_err(|e| QaError::Other(anyhow!("answer task failed: {e}")))?
    }

    /// Blocking form of [`answer`](Self::answer).
    pub fn answer_blocking(&self, query: &str) -> Result<Answer> {
        let knowledge = self.ready_knowledge()?;

        let query = query.trim();
        if query.is_empty() {
            return Err(QaError::InvalidInput("No message provided".to_string()));
        }

        let query_vector = self
            .embedder
            .encode_one(query)
            .map_err(|e| QaError::UpstreamFailure(format!("embedding query failed: {e:#}")))?;

        let retrieved = knowledge.retrieve_context(&query_vector, self.options.top_k)?;
        debug!(
            "Retrieved rows {}",
            retrieved.iter().map(|r| r.chunk.row).join(", ")
        );

        let context = retrieved
            .iter()
            .map(|r| r.chunk.text.as_str())
            .join(CONTEXT_SEPARATOR);
        if context.is_empty() {
            warn!("No context retrieved for query");
        }

        self.answerer
            .answer(query, &context)
            .map_err(|e| QaError::UpstreamFailure(format!("answering failed: {e:#}")))
    }

    fn ready_knowledge(&self) -> Result<&KnowledgeBase> {
        let snapshot = self.state.get();
        if !snapshot.is_ready() {
            return Err(QaError::NotReady(snapshot.message.clone()));
        }
        self.knowledge
            .get()
            .ok_or_else(|| QaError::NotReady("knowledge base not published".to_string()))
    }
}
