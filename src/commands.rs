use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{Config, EmbeddingBackend};
use crate::context::build_context;
use crate::embeddings::OllamaClient;
use crate::indexer::{IngestReport, Indexer};
use crate::store::{RagStore, StoreState};

/// Extract, chunk and index files into the configured store
#[inline]
pub fn ingest_paths(config: &Config, paths: &[PathBuf]) -> Result<IngestReport> {
    let indexer = Indexer::from_config(config).context("Failed to open the index")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Ingesting {} files", paths.len()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = indexer.ingest_files(paths);
    bar.finish_and_clear();

    let report = result.context("Ingestion failed")?;

    println!(
        "{} Indexed {} chunks from {} documents",
        style("✓").green(),
        report.chunks,
        report.documents
    );
    if !report.skipped.is_empty() {
        println!(
            "{} Skipped {} files with no extractable text:",
            style("!").yellow(),
            report.skipped.len()
        );
        for path in &report.skipped {
            println!("   {}", path.display());
        }
    }

    Ok(report)
}

/// Search the configured store and print the hits or the assembled context
#[inline]
pub fn query_store(config: &Config, text: &str, k: Option<usize>, show_context: bool) -> Result<()> {
    let store = RagStore::from_config(config).context("Failed to open the index")?;
    let k = k.unwrap_or(config.retrieval.top_k);
    info!("Querying for top {} chunks", k);

    if store.state()? != StoreState::Populated {
        println!("No documents indexed yet.");
        println!("Use 'rag-store ingest <PATH>...' to add documents.");
        return Ok(());
    }

    let hits = store.query(text, k).context("Query failed")?;

    if show_context {
        let context = build_context(&hits, config.retrieval.max_context_chars);
        println!("{}", context.text);
        println!();
        println!(
            "{} {}",
            style("Sources:").bold(),
            context.sources.join(", ")
        );
        if context.truncated {
            println!(
                "{}",
                style(format!(
                    "(context truncated to {} characters)",
                    config.retrieval.max_context_chars
                ))
                .dim()
            );
        }
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{} {} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(&hit.chunk.source).cyan(),
            style(format!("(distance {:.4})", hit.distance)).dim()
        );
        println!("   {}", hit.chunk.text.replace('\n', "\n   "));
        println!();
    }

    Ok(())
}

/// Show detailed status of the index and embedding backend
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("RAG Store Status").bold());
    println!("{}", "=".repeat(50));
    println!();

    println!("Embedding:");
    match config.embedding.backend {
        EmbeddingBackend::Hashing => {
            println!(
                "   Backend: hashing ({} dimensions)",
                config.embedding.dimension
            );
        }
        EmbeddingBackend::Ollama => {
            println!("   Backend: ollama ({})", config.ollama.model);
            match OllamaClient::new(config).and_then(|client| client.health_check()) {
                Ok(()) => println!(
                    "   {} Connected ({}:{})",
                    style("✓").green(),
                    config.ollama.host,
                    config.ollama.port
                ),
                Err(e) => {
                    error!("Ollama health check failed: {}", e);
                    println!("   {} Unavailable: {}", style("✗").red(), e);
                }
            }
        }
    }
    println!();

    let index_path = config.index_path();
    println!("Index:");
    println!("   Path: {}", index_path.display());
    println!("   Metric: {}", config.index.metric);

    let store = match RagStore::from_config(config) {
        Ok(store) => store,
        Err(e) => {
            println!("   {} Failed to open: {}", style("✗").red(), e);
            return Ok(());
        }
    };

    let stats = store.stats()?;
    println!("   State: {}", stats.state);
    println!("   Chunks: {}", stats.chunks);
    println!("   Sources: {}", stats.sources);
    if let Some(dimension) = stats.dimension {
        println!("   Dimension: {}", dimension);
    }

    Ok(())
}
