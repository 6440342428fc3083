// Embeddings module
// Embedding backends and document chunking

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, EmbeddingBackend};

pub use chunking::{
    Chunk, ChunkingConfig, Document, SOURCE_KEY, TextSplitter, source_name, split_text,
};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// A deterministic text-to-vector function.
///
/// Implementations must return vectors of one fixed length for the lifetime of
/// a model, and the same vector for the same input text.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, returning one vector per input in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model, persisted alongside the vectors it produced
    fn model_id(&self) -> String;
}

/// Build the embedder selected in the configuration
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.backend {
        EmbeddingBackend::Hashing => {
            let dimension = usize::try_from(config.embedding.dimension)
                .context("Embedding dimension does not fit in usize")?;
            Ok(Arc::new(HashingEmbedder::new(dimension)?))
        }
        EmbeddingBackend::Ollama => Ok(Arc::new(
            OllamaClient::new(config).context("Failed to initialize Ollama client")?,
        )),
    }
}
