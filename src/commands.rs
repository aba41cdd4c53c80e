use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::answer;
use crate::chunking::{ChunkingConfig, chunk_count, chunk_text};
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::server;
use crate::service::{RetrievalService, ServiceOptions};
use crate::source::{self, ContentSource};

/// Everything a command needs to run the question-answering pipeline
struct Pipeline {
    service: Arc<RetrievalService>,
    source: Arc<dyn ContentSource>,
    fetch_timeout: Duration,
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedder = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    let answerer = answer::from_config(&config.answerer).context("Failed to create answerer")?;
    let source = source::from_config(&config.source).context("Failed to create content source")?;

    let service = Arc::new(RetrievalService::new(
        Arc::new(embedder),
        answerer,
        ServiceOptions::from(config),
    ));

    Ok(Pipeline {
        service,
        source,
        fetch_timeout: Duration::from_secs(config.source.fetch_timeout_seconds),
    })
}

/// Run the HTTP service until interrupted.
///
/// The listener is bound before the knowledge base is built, so `/health`
/// reports progress while initialization runs in the background.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let init = Arc::clone(&pipeline.service).initialize(pipeline.source, pipeline.fetch_timeout);
    tokio::spawn(async move {
        if let Err(e) = init.await {
            // Already recorded in the status snapshot; the server keeps running
            warn!("Knowledge base unavailable: {}", e);
        }
    });

    server::serve(listener, pipeline.service, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Build the knowledge base once and answer a single question.
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Building knowledge base from {}", pipeline.source.describe()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let initialized = Arc::clone(&pipeline.service)
        .initialize(pipeline.source, pipeline.fetch_timeout)
        .await;
    bar.finish_and_clear();
    initialized.context("Failed to build knowledge base")?;

    if let Some(knowledge) = pipeline.service.knowledge() {
        eprintln!(
            "{}",
            style(format!("Indexed {} chunks", knowledge.chunk_count())).dim()
        );
    }

    let answer = pipeline
        .service
        .answer(question)
        .await
        .context("Failed to answer question")?;

    println!("{}", answer.answer);
    eprintln!(
        "{} {}",
        style("Confidence:").bold(),
        style(format!("{:.3}", answer.score)).cyan()
    );
    Ok(())
}

/// Print the chunks a text would be split into.
#[inline]
pub fn chunk(
    config: &Config,
    file: Option<&Path>,
    window_size: Option<usize>,
    stride: Option<usize>,
    count_only: bool,
) -> Result<()> {
    let chunking = ChunkingConfig::new(
        window_size.unwrap_or(config.chunking.window_size),
        stride.unwrap_or(config.chunking.stride),
    );
    chunking.validate()?;

    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read standard input")?;
            text
        }
    };

    if count_only {
        println!("{}", chunk_count(text.chars().count(), &chunking)?);
        return Ok(());
    }

    let chunks = chunk_text(&text, &chunking)?;
    for (index, chunk) in chunks.iter().enumerate() {
        println!(
            "{} {}",
            style(format!("#{index}")).bold().yellow(),
            style(format!("({} chars)", chunk.chars().count())).dim()
        );
        println!("{chunk}");
        println!();
    }
    eprintln!(
        "{} chunks (window {}, stride {}, overlap {})",
        chunks.len(),
        chunking.window_size,
        chunking.stride,
        chunking.overlap()
    );
    Ok(())
}

/// Write a default `config.toml` unless one already exists.
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    let path = config.config_file_path();
    if path.exists() {
        println!(
            "Configuration already exists at {}",
            style(path.display()).dim()
        );
        return Ok(());
    }

    config.save().context("Failed to save configuration")?;
    println!(
        "{} {}",
        style("Wrote default configuration to").green(),
        style(path.display()).dim()
    );
    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!(
        "  Address: {}",
        style(format!("{}:{}", config.server.host, config.server.port)).cyan()
    );

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Window: {}", style(config.chunking.window_size).cyan());
    eprintln!("  Stride: {}", style(config.chunking.stride).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.overlap()).cyan());
    eprintln!("  Top k: {}", style(config.retrieval.top_k).cyan());

    eprintln!("{}", style("Ollama:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());

    eprintln!("{}", style("Answerer:").bold().yellow());
    eprintln!("  Kind: {}", style(format!("{:?}", config.answerer.kind)).cyan());
    if let Some(endpoint) = &config.answerer.endpoint {
        eprintln!("  Endpoint: {}", style(endpoint).cyan());
    }

    eprintln!("{}", style("Source:").bold().yellow());
    eprintln!("  Kind: {}", style(format!("{:?}", config.source.kind)).cyan());
    eprintln!("  URL: {}", style(&config.source.url).cyan());
    if let Some(space) = &config.source.confluence.space_key {
        eprintln!("  Space: {}", style(space).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
