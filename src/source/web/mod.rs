
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};
use url::Url;

use super::{ContentSource, build_agent, extract_page};
use crate::config::SourceConfig;
use crate::knowledge::Document;

/// A single web page scraped for its visible text
#[derive(Debug, Clone)]
pub struct WebPageSource {
    url: Url,
    user_agent: String,
    agent: ureq::Agent,
}

impl WebPageSource {
    #[inline]
    pub fn new(url: Url, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url,
            user_agent: user_agent.into(),
            agent: build_agent(timeout),
        }
    }

    #[inline]
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("Invalid source URL: {}", config.url))?;
        Ok(Self::new(
            url,
            config.user_agent.clone(),
            Duration::from_secs(config.fetch_timeout_seconds),
        ))
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn download(&self) -> Result<String> {
        debug!("Fetching {}", self.url);

        self.agent
            .get(self.url.as_str())
            .header("User-Agent", &self.user_agent)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    anyhow!("Fetching {} returned HTTP {}", self.url, status)
                }
                other => anyhow!("Fetching {} failed: {}", self.url, other),
            })
    }
}

impl ContentSource for WebPageSource {
    fn fetch(&self) -> Result<Vec<Document>> {
        let html = self.download()?;
        let page = extract_page(&html)
            .with_context(|| format!("Failed to extract text from {}", self.url))?;

        if page.text.is_empty() {
            warn!("No visible text found at {}", self.url);
            return Ok(Vec::new());
        }

        info!(
            "Fetched {} ({} chars of text)",
            self.url,
            page.text.chars().count()
        );

        let mut document = Document::new(page.text).with_source_id(self.url.as_str());
        document.title = page.title;
        Ok(vec![document])
    }

    fn describe(&self) -> String {
        format!("web page {}", self.url)
    }
}
