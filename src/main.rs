use std::path::PathBuf;

use clap::{Parser, Subcommand};
use retrieval_qa::Result;
use retrieval_qa::commands::{ask, chunk, init_config, serve, show_config};
use retrieval_qa::config::{Config, get_config_dir};

#[derive(Parser)]
#[command(name = "retrieval-qa")]
#[command(about = "Question answering over a scraped corpus with a vector index")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the knowledge base and answer one question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show how a text is split into chunks
    Chunk {
        /// File to read; standard input when omitted
        file: Option<PathBuf>,
        #[arg(long)]
        window_size: Option<usize>,
        #[arg(long)]
        stride: Option<usize>,
        /// Only print the number of chunks
        #[arg(long)]
        count: bool,
    },
    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let mut config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
                config.validate()?;
            }
            serve(&config).await?;
        }
        Commands::Ask { question } => {
            ask(&config, &question).await?;
        }
        Commands::Chunk {
            file,
            window_size,
            stride,
            count,
        } => {
            chunk(&config, file.as_deref(), window_size, stride, count)?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config)?;
            }
        }
    }

    Ok(())
}
