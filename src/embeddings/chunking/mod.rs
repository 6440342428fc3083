#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Metadata key every chunk carries, naming the document it came from
pub const SOURCE_KEY: &str = "source";

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Extracted text of one ingested file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let mut metadata = BTreeMap::new();
        metadata.insert(SOURCE_KEY.to_string(), source.clone());
        Self {
            source,
            text: text.into(),
            metadata,
        }
    }

    /// Create a document named after the final component of `path`
    #[inline]
    pub fn from_path(path: &Path, text: impl Into<String>) -> Self {
        Self::new(source_name(path), text)
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Represents a chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Identifier of the originating document
    pub source: String,
    /// Document metadata, copied verbatim into every chunk
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    #[inline]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut metadata = BTreeMap::new();
        metadata.insert(SOURCE_KEY.to_string(), source.clone());
        Self {
            text: text.into(),
            source,
            metadata,
        }
    }

    /// Length of the chunk in characters
    #[inline]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Sliding-window splitter over the characters of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Fails when the window could not make progress
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance the window advances between chunks
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Number of chunks a text of `char_len` characters splits into
    #[inline]
    pub fn expected_chunk_count(&self, char_len: usize) -> usize {
        if char_len == 0 {
            0
        } else if char_len <= self.chunk_size {
            1
        } else {
            (char_len - self.chunk_overlap).div_ceil(self.step())
        }
    }

    /// Split text into overlapping windows of at most `chunk_size` characters
    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::with_capacity(self.expected_chunk_count(total));

        let mut start = 0;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            chunks.push(chars[start..end].iter().collect());
            if end == total {
                break;
            }
            start += self.step();
        }

        chunks
    }

    /// Split a document, tagging every chunk with the document's metadata
    #[inline]
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = self
            .split(&document.text)
            .into_iter()
            .map(|text| Chunk {
                text,
                source: document.source.clone(),
                metadata: document.metadata.clone(),
            })
            .collect();

        debug!(
            "Chunked document '{}' into {} chunks (size {}, overlap {})",
            document.source,
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }
}

/// Split `text` with a one-off splitter
#[inline]
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(TextSplitter::new(chunk_size, chunk_overlap)?.split(text))
}

/// Basename of a path, used as the document source
#[inline]
pub fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
