
use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{Answer, Answerer};
use crate::config::AnswererConfig;

/// Client for a hosted extractive question-answering model.
///
/// Speaks the Hugging Face inference format: the request carries
/// `{"inputs": {"question", "context"}}` and the reply is an `{answer, score}`
/// object, or a list holding one.
#[derive(Debug, Clone)]
pub struct HttpAnswerer {
    endpoint: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct QaRequest<'a> {
    inputs: QaInputs<'a>,
}

#[derive(Debug, Serialize)]
struct QaInputs<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Debug, Deserialize)]
struct QaAnswer {
    answer: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QaResponse {
    Single(QaAnswer),
    List(Vec<QaAnswer>),
    Failure { error: String },
}

impl HttpAnswerer {
    #[inline]
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            endpoint,
            token: None,
            agent: build_agent(timeout),
        }
    }

    /// Build from the `[answerer]` table, reading the bearer token from the
    /// environment variable it names.
    #[inline]
    pub fn from_config(config: &AnswererConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("answerer.endpoint must be set for the http answerer"))?;
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid answerer endpoint: {endpoint}"))?;

        let mut answerer = Self::new(endpoint, Duration::from_secs(config.timeout_seconds));

        if let Some(var) = config.api_token_env.as_deref() {
            let token = env::var(var)
                .with_context(|| format!("Environment variable {var} is not set"))?;
            answerer = answerer.with_token(token);
        }

        Ok(answerer)
    }

    #[inline]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, question: &str, context: &str) -> Result<QaResponse> {
        let body = serde_json::to_string(&QaRequest {
            inputs: QaInputs { question, context },
        })
        .context("Failed to serialize answer request")?;

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let text = request
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    anyhow!("Answer endpoint returned HTTP {status}")
                }
                other => anyhow!("Answer request failed: {other}"),
            })?;

        serde_json::from_str(&text).context("Failed to parse answer response")
    }
}

impl Answerer for HttpAnswerer {
    fn answer(&self, question: &str, context: &str) -> Result<Answer> {
        if context.trim().is_empty() {
            debug!("Empty context, skipping answer request");
            return Ok(Answer::empty());
        }

        debug!(
            "Requesting answer from {} ({} context chars)",
            self.endpoint,
            context.chars().count()
        );

        match self.request(question, context)? {
            QaResponse::Single(qa) => Ok(Answer::new(qa.answer, qa.score)),
            QaResponse::List(list) => list
                .into_iter()
                .next()
                .map(|qa| Answer::new(qa.answer, qa.score))
                .ok_or_else(|| anyhow!("Answer endpoint returned an empty list")),
            QaResponse::Failure { error } => {
                warn!("Answer endpoint reported an error: {}", error);
                Err(anyhow!("Answer endpoint error: {error}"))
            }
        }
    }

    fn load(&self) -> Result<()> {
        self.answer("What is this?", "This is a readiness check.")
            .with_context(|| format!("Answer model at {} is not usable", self.endpoint))?;
        info!("Answer model at {} is ready", self.endpoint);
        Ok(())
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
