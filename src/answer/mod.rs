// Answer module
// Extractive question answering over a retrieved context

pub mod http;
pub mod lexical;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{AnswererConfig, AnswererKind};

pub use http::HttpAnswerer;
pub use lexical::LexicalAnswerer;

/// An extracted answer and the model's confidence in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Confidence in `[0, 1]`
    pub score: f32,
}

impl Answer {
    #[inline]
    pub fn new(answer: impl Into<String>, score: f32) -> Self {
        Self {
            answer: answer.into(),
            score: clamp_score(score),
        }
    }

    /// The answer given when there is nothing to extract from
    #[inline]
    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// An extractive question-answering model.
///
/// `answer` is called even when the context is empty; implementations decide
/// what an answer over no text looks like.
pub trait Answerer: Send + Sync {
    fn answer(&self, question: &str, context: &str) -> Result<Answer>;

    /// Make sure the model is reachable and usable.
    fn load(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the answerer selected by `config`.
#[inline]
pub fn from_config(config: &AnswererConfig) -> Result<Arc<dyn Answerer>> {
    Ok(match config.kind {
        AnswererKind::Lexical => Arc::new(LexicalAnswerer::new()),
        AnswererKind::Http => Arc::new(HttpAnswerer::from_config(config)?),
    })
}

/// NaN counts as no confidence.
pub(crate) fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
