
use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use tracing::debug;

use super::{Answer, Answerer};

static SENTENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n]+[.!?]*").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "had",
    "has", "have", "how", "in", "is", "it", "of", "on", "or", "the", "to", "was", "were", "what",
    "when", "where", "which", "who", "whom", "why", "with",
];

/// Offline answerer that picks the context sentence sharing the most words
/// with the question.
///
/// The score is the fraction of distinct question terms found in that
/// sentence. Stop words are ignored unless the question has nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalAnswerer;

impl LexicalAnswerer {
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl Answerer for LexicalAnswerer {
    fn answer(&self, question: &str, context: &str) -> Result<Answer> {
        let sentences = split_sentences(context)?;
        let Some(first) = sentences.first() else {
            return Ok(Answer::empty());
        };

        let terms = query_terms(question);
        if terms.is_empty() {
            debug!("Question has no searchable terms");
            return Ok(Answer::new(*first, 0.0));
        }

        let mut best = (0, *first);
        for &sentence in &sentences {
            let words: HashSet<String> = words(sentence).collect();
            let matched = terms.iter().filter(|t| words.contains(*t)).count();
            // Earlier sentences come from nearer chunks and win ties.
            if matched > best.0 {
                best = (matched, sentence);
            }
        }

        let score = best.0 as f32 / terms.len() as f32;
        debug!(
            "Matched {}/{} question terms across {} sentences",
            best.0,
            terms.len(),
            sentences.len()
        );
        Ok(Answer::new(best.1, score))
    }
}

pub(crate) fn split_sentences(text: &str) -> Result<Vec<&str>> {
    let mut sentences = Vec::new();
    for found in SENTENCE_REGEX.find_iter(text) {
        let sentence = found.context("Sentence split failed")?.as_str().trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }
    Ok(sentences)
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn query_terms(question: &str) -> HashSet<String> {
    let all: HashSet<String> = words(question).collect();
    let content: HashSet<String> = all
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .cloned()
        .collect();

    if content.is_empty() { all } else { content }
}
