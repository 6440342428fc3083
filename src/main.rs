use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rag_store::{RagError, Result};
use rag_store::commands::{ingest_paths, query_store, show_status};
use rag_store::config::{Config, resolve_base_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "rag-store")]
#[command(about = "Index documents into a persistent vector store and retrieve context for questions")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and the index
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and index text, Markdown and PDF files
    Ingest {
        /// Files to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Retrieve the chunks most similar to a question
    Query {
        /// Question or search text
        text: String,
        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
        /// Print the assembled context instead of individual hits
        #[arg(long)]
        context: bool,
    },
    /// Show the state of the index and embedding backend
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir).map_err(|e| RagError::Config(e.to_string()))?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { paths } => {
            ingest_paths(&Config::load(&base_dir)?, &paths)?;
        }
        Commands::Query { text, k, context } => {
            query_store(&Config::load(&base_dir)?, &text, k, context)?;
        }
        Commands::Status => {
            show_status(&Config::load(&base_dir)?)?;
        }
    }

    Ok(())
}
