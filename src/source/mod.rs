// Source module
// Where the corpus comes from and how HTML is reduced to plain text

pub mod confluence;
pub mod web;


use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::{SourceConfig, SourceKind};
use crate::knowledge::Document;

pub use confluence::ConfluenceSource;
pub use web::WebPageSource;

/// Elements whose text never belongs in the corpus
const UNWANTED_ELEMENTS: &str = "script, style, nav, footer, head";

/// Preferred content root on MediaWiki pages
const CONTENT_ROOT: &str = "div#mw-content-text";

/// A provider of documents to ingest.
///
/// `fetch` blocks; callers on an async runtime run it on a blocking thread.
pub trait ContentSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Document>>;

    /// Short human-readable description used in logs and status messages
    fn describe(&self) -> String;
}

/// Plain text and title pulled out of an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Build the source selected by `config`.
#[inline]
pub fn from_config(config: &SourceConfig) -> Result<Arc<dyn ContentSource>> {
    Ok(match config.kind {
        SourceKind::Web => Arc::new(WebPageSource::from_config(config)?),
        SourceKind::Confluence => Arc::new(ConfluenceSource::from_config(config)?),
    })
}

/// Reduce a full HTML page to its visible text.
#[inline]
pub fn extract_page(html: &str) -> Result<ExtractedPage> {
    let mut document = Html::parse_document(html);

    let title_selector = parse_selector("title")?;
    let title = document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty());

    remove_unwanted_elements(&mut document)?;
    let text = visible_text(&document)?;

    debug!(
        "Extracted {} chars of text, title {:?}",
        text.chars().count(),
        title
    );
    Ok(ExtractedPage { title, text })
}

/// Reduce an HTML fragment (such as a wiki page body) to its visible text.
#[inline]
pub fn extract_text(html: &str) -> Result<String> {
    let mut document = Html::parse_fragment(html);
    remove_unwanted_elements(&mut document)?;
    visible_text(&document)
}

fn parse_selector(selectors: &str) -> Result<Selector> {
    Selector::parse(selectors).map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))
}

fn remove_unwanted_elements(document: &mut Html) -> Result<()> {
    let unwanted_selector = parse_selector(UNWANTED_ELEMENTS)?;

    // Collect ids first, the tree cannot be borrowed while detaching
    let unwanted_node_ids: Vec<_> = document
        .select(&unwanted_selector)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
    Ok(())
}

fn visible_text(document: &Html) -> Result<String> {
    let content_selector = parse_selector(CONTENT_ROOT)?;
    let body_selector = parse_selector("body")?;

    let root: ElementRef<'_> = document
        .select(&content_selector)
        .next()
        .or_else(|| document.select(&body_selector).next())
        .unwrap_or_else(|| document.root_element());

    Ok(clean_lines(root.text()))
}

/// Trim every line and drop the blank ones.
fn clean_lines<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let mut lines = Vec::new();
    for fragment in fragments {
        lines.extend(fragment.lines().map(str::trim).filter(|l| !l.is_empty()));
    }
    lines.join("\n")
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
