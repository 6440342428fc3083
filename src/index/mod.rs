// Vector index module
// Exact nearest-neighbour search over chunk embeddings


pub mod persistence;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};

/// Distance function used to rank chunks against a query
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cosine similarity`, in `[0, 2]`
    #[default]
    Cosine,
    /// Euclidean distance
    L2,
}

impl Metric {
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                // A zero vector is equally far from everything
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }

                1.0 - dot / (norm_a * norm_b)
            }
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::L2 => f.write_str("l2"),
        }
    }
}

/// One stored chunk and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Append-only collection of embedded chunks with brute-force top-k search
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    metric: Metric,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
    created_at: DateTime<Utc>,
}

impl VectorIndex {
    #[inline]
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            dimension: None,
            entries: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Vector length, fixed by the first insertion
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Entries in insertion order
    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Distinct chunk sources in first-inserted order
    #[inline]
    pub fn sources(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.chunk.source.as_str())
            .unique()
            .collect()
    }

    /// Embed chunks and append them, returning how many were added
    #[inline]
    pub fn insert(&mut self, embedder: &dyn Embedder, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        self.insert_embedded(vectors.into_iter().zip(chunks).collect())
    }

    /// Append pre-computed (vector, chunk) pairs.
    ///
    /// The whole batch is rejected, leaving the index untouched, if any vector
    /// disagrees with the index dimension or holds a non-finite value.
    #[inline]
    pub fn insert_embedded(&mut self, items: Vec<(Vec<f32>, Chunk)>) -> Result<usize> {
        let Some((first_vector, _)) = items.first() else {
            return Ok(0);
        };

        let dimension = self.dimension.unwrap_or(first_vector.len());
        if dimension == 0 {
            return Err(RagError::Config(
                "Embedding vectors must not be empty".to_string(),
            ));
        }

        for (vector, chunk) in &items {
            if vector.len() != dimension {
                return Err(RagError::Config(format!(
                    "Embedding dimension mismatch for chunk from '{}': expected {}, got {}",
                    chunk.source,
                    dimension,
                    vector.len()
                )));
            }
            if vector.iter().any(|value| !value.is_finite()) {
                return Err(RagError::Embedding(format!(
                    "Embedding for chunk from '{}' contains non-finite values",
                    chunk.source
                )));
            }
        }

        let added = items.len();
        self.dimension = Some(dimension);
        self.entries
            .extend(items.into_iter().map(|(vector, chunk)| IndexEntry {
                id: Uuid::new_v4(),
                vector,
                chunk,
            }));

        debug!(
            "Inserted {} entries ({} total, dimension {})",
            added,
            self.entries.len(),
            dimension
        );
        Ok(added)
    }

    /// The `k` entries closest to `query`, nearest first.
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };

        if query.len() != dimension {
            return Err(RagError::Config(format!(
                "Query dimension mismatch: expected {}, got {}",
                dimension,
                query.len()
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let hits: Vec<SearchHit> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (self.metric.distance(query, &entry.vector), position))
            .k_smallest_by(k, compare_ranked)
            .map(|(distance, position)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                distance,
            })
            .collect();

        debug!(
            "Search over {} entries returned {} hits",
            self.entries.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Drop entries past `len`, undoing a batch whose persistence failed
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

fn compare_ranked(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}
