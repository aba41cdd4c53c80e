//! Deterministic collaborators for unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::answer::{Answer, Answerer};
use crate::embeddings::Embedder;
use crate::index::Embedding;
use crate::knowledge::Document;
use crate::source::ContentSource;

/// Embeds a text as `[chars, first char, last char]`.
///
/// Setting `fail_next` makes the next call fail.
#[derive(Debug, Default)]
pub struct CharEmbedder {
    pub calls: AtomicUsize,
    pub fail_next: AtomicBool,
}

impl CharEmbedder {
    pub fn vector_for(text: &str) -> Embedding {
        let first = text.chars().next().map_or(0.0, |c| c as u32 as f32);
        let last = text.chars().last().map_or(0.0, |c| c as u32 as f32);
        vec![text.chars().count() as f32, first, last]
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CharEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Fails every call.
#[derive(Debug, Default)]
pub struct FailingEmbedder {
    pub fail_load: bool,
}

impl Embedder for FailingEmbedder {
    fn encode(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        bail!("embedding model crashed")
    }

    fn load(&self) -> Result<()> {
        if self.fail_load {
            bail!("embedding model not found");
        }
        Ok(())
    }
}

/// Returns one vector fewer than asked for.
#[derive(Debug, Default)]
pub struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .skip(1)
            .map(|t| CharEmbedder::vector_for(t))
            .collect())
    }
}

/// Answers with the first line of its context and remembers what it saw.
#[derive(Debug, Default)]
pub struct EchoAnswerer {
    pub last_context: Mutex<Option<String>>,
    pub fail_load: bool,
    pub fail_answer: bool,
}

impl EchoAnswerer {
    pub fn last_context(&self) -> Option<String> {
        self.last_context
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Answerer for EchoAnswerer {
    fn answer(&self, _question: &str, context: &str) -> Result<Answer> {
        if self.fail_answer {
            return Err(anyhow!("answer model crashed"));
        }
        if let Ok(mut last) = self.last_context.lock() {
            *last = Some(context.to_string());
        }
        Ok(Answer {
            answer: context.lines().next().unwrap_or_default().to_string(),
            score: if context.is_empty() { 0.0 } else { 0.75 },
        })
    }

    fn load(&self) -> Result<()> {
        if self.fail_load {
            bail!("answer model failed to load");
        }
        Ok(())
    }
}

/// Hands out a fixed set of documents, optionally after a delay.
#[derive(Debug, Default)]
pub struct StaticSource {
    pub documents: Vec<Document>,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl StaticSource {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            documents: texts.iter().map(|t| Document::new(*t)).collect(),
            ..Self::default()
        }
    }
}

impl ContentSource for StaticSource {
    fn fetch(&self) -> Result<Vec<Document>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            bail!("connection refused");
        }
        Ok(self.documents.clone())
    }

    fn describe(&self) -> String {
        "static test source".to_string()
    }
}
