
use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{ContentSource, build_agent, extract_text};
use crate::config::SourceConfig;
use crate::knowledge::Document;

/// Every page of one Confluence space, read through the REST content API
#[derive(Debug, Clone)]
pub struct ConfluenceSource {
    base_url: Url,
    space_key: String,
    username: String,
    token_env: String,
    page_limit: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct ContentPage {
    results: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    id: String,
    title: String,
    body: Option<ContentBody>,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    storage: Option<StorageBody>,
}

#[derive(Debug, Deserialize)]
struct StorageBody {
    value: String,
}

impl ConfluenceSource {
    #[inline]
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid Confluence URL: {}", config.url))?;
        let confluence = &config.confluence;

        let space_key = confluence
            .space_key
            .clone()
            .ok_or_else(|| anyhow!("source.confluence.space_key must be set"))?;
        let username = confluence
            .username
            .clone()
            .ok_or_else(|| anyhow!("source.confluence.username must be set"))?;

        Ok(Self {
            base_url,
            space_key,
            username,
            token_env: confluence.api_token_env.clone(),
            page_limit: confluence.page_limit.max(1),
            agent: build_agent(Duration::from_secs(config.fetch_timeout_seconds)),
        })
    }

    #[inline]
    pub fn space_key(&self) -> &str {
        &self.space_key
    }

    fn authorization(&self) -> Result<String> {
        let token = env::var(&self.token_env)
            .with_context(|| format!("Environment variable {} is not set", self.token_env))?;
        let credentials = BASE64.encode(format!("{}:{}", self.username, token));
        Ok(format!("Basic {credentials}"))
    }

    fn page_url(&self, start: u32) -> Result<Url> {
        // Confluence is often hosted under a context path such as /wiki
        let mut url = Url::parse(&format!(
            "{}/rest/api/content",
            self.base_url.as_str().trim_end_matches('/')
        ))
        .context("Failed to build Confluence content URL")?;
        url.query_pairs_mut()
            .append_pair("spaceKey", &self.space_key)
            .append_pair("type", "page")
            .append_pair("start", &start.to_string())
            .append_pair("limit", &self.page_limit.to_string())
            .append_pair("expand", "body.storage");
        Ok(url)
    }

    fn fetch_page(&self, start: u32, authorization: &str) -> Result<Vec<ContentItem>> {
        let url = self.page_url(start)?;
        debug!("Fetching Confluence pages from {}", url);

        let text = self
            .agent
            .get(url.as_str())
            .header("Authorization", authorization)
            .header("Accept", "application/json")
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    anyhow!("Confluence returned HTTP {} for start={}", status, start)
                }
                other => anyhow!("Confluence request failed: {}", other),
            })?;

        let page: ContentPage =
            serde_json::from_str(&text).context("Failed to parse Confluence response")?;
        Ok(page.results)
    }
}

impl ContentSource for ConfluenceSource {
    fn fetch(&self) -> Result<Vec<Document>> {
        let authorization = self.authorization()?;
        let mut documents = Vec::new();
        let mut start = 0;

        loop {
            let items = self.fetch_page(start, &authorization)?;
            if items.is_empty() {
                break;
            }
            start += u32::try_from(items.len()).context("Confluence page too large")?;

            for item in items {
                let html = item
                    .body
                    .and_then(|body| body.storage)
                    .map(|storage| storage.value)
                    .unwrap_or_default();
                let text = extract_text(&html)
                    .with_context(|| format!("Failed to extract text from page {}", item.id))?;

                if text.is_empty() {
                    debug!("Skipping empty page {} ({})", item.id, item.title);
                    continue;
                }

                documents.push(
                    Document::new(text)
                        .with_title(item.title)
                        .with_source_id(item.id),
                );
            }
        }

        info!(
            "Fetched {} pages from Confluence space {}",
            documents.len(),
            self.space_key
        );
        Ok(documents)
    }

    fn describe(&self) -> String {
        format!("Confluence space {} at {}", self.space_key, self.base_url)
    }
}
