//! The RAG store: one vector index, one embedder, optional write-through
//! persistence.
//!
//! A store moves through three states and never goes back:
//!
//! - `Uninitialized` until the first operation (or [`RagStore::open`]) tries
//!   to load the persisted index,
//! - `Empty` when nothing was loaded and nothing has been ingested yet,
//! - `Populated` once the index holds at least one chunk.
//!
//! A persisted index that cannot be loaded is logged and ignored; the next
//! successful ingest overwrites it.


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{Chunk, Embedder, embedder_from_config};
use crate::index::persistence::{LoadExpectations, index_exists};
use crate::index::{Metric, SearchHit, VectorIndex};
use crate::{RagError, Result};

/// Number of chunks returned by a query when the caller has no preference
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Empty,
    Populated,
}

impl fmt::Display for StoreState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Empty => f.write_str("empty"),
            Self::Populated => f.write_str("populated"),
        }
    }
}

/// Snapshot of what a store currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub state: StoreState,
    pub chunks: usize,
    pub sources: usize,
    pub dimension: Option<usize>,
}

enum Slot {
    Uninitialized,
    Empty,
    Populated(VectorIndex),
}

impl Slot {
    fn state(&self) -> StoreState {
        match self {
            Self::Uninitialized => StoreState::Uninitialized,
            Self::Empty => StoreState::Empty,
            Self::Populated(_) => StoreState::Populated,
        }
    }
}

pub struct RagStore {
    embedder: Arc<dyn Embedder>,
    persist_path: Option<PathBuf>,
    metric: Metric,
    index: Mutex<Slot>,
}

impl RagStore {
    /// Create a store without touching the disk
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, persist_path: Option<PathBuf>, metric: Metric) -> Self {
        Self {
            embedder,
            persist_path,
            metric,
            index: Mutex::new(Slot::Uninitialized),
        }
    }

    /// Create a store and load its persisted index, if any
    #[inline]
    pub fn open(
        embedder: Arc<dyn Embedder>,
        persist_path: Option<PathBuf>,
        metric: Metric,
    ) -> Result<Self> {
        let store = Self::new(embedder, persist_path, metric);
        store.initialize()?;
        Ok(store)
    }

    /// Open the store described by a configuration
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = embedder_from_config(config)?;
        Self::open(embedder, Some(config.index_path()), config.index.metric)
    }

    #[inline]
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Load the persisted index if that has not been attempted yet
    #[inline]
    pub fn initialize(&self) -> Result<StoreState> {
        let mut slot = self.lock()?;
        self.ensure_loaded(&mut slot);
        Ok(slot.state())
    }

    /// Current state, without attempting a load
    #[inline]
    pub fn state(&self) -> Result<StoreState> {
        Ok(self.lock()?.state())
    }

    #[inline]
    pub fn stats(&self) -> Result<StoreStats> {
        let slot = self.lock()?;
        let stats = match &*slot {
            Slot::Populated(index) => StoreStats {
                state: StoreState::Populated,
                chunks: index.len(),
                sources: index.sources().len(),
                dimension: index.dimension(),
            },
            other => StoreStats {
                state: other.state(),
                chunks: 0,
                sources: 0,
                dimension: None,
            },
        };
        Ok(stats)
    }

    /// Embed and index `chunks`, then persist the index.
    ///
    /// An empty batch does nothing. If persisting fails the batch is taken
    /// back out of the index so memory and disk stay in agreement.
    #[inline]
    pub fn ingest(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            debug!("Ignoring empty ingest batch");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let items: Vec<(Vec<f32>, Chunk)> = vectors.into_iter().zip(chunks).collect();

        let mut slot = self.lock()?;
        self.ensure_loaded(&mut slot);

        if let Slot::Populated(index) = &mut *slot {
            let previous_len = index.len();
            let added = index.insert_embedded(items)?;
            if let Err(e) = self.persist(index) {
                index.truncate(previous_len);
                return Err(e);
            }
            info!("Ingested {} chunks ({} total)", added, index.len());
            return Ok(added);
        }

        let mut index = VectorIndex::new(self.metric);
        let added = index.insert_embedded(items)?;
        self.persist(&index)?;
        info!("Ingested {} chunks into a new index", added);
        *slot = Slot::Populated(index);
        Ok(added)
    }

    /// The `k` chunks nearest to `text`; empty while nothing is indexed
    #[inline]
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.initialize()? != StoreState::Populated {
            debug!("Query on an empty store");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(text)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        match &*self.lock()? {
            Slot::Populated(index) => index.search(&vector, k),
            Slot::Uninitialized | Slot::Empty => Ok(Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>> {
        self.index
            .lock()
            .map_err(|_| RagError::Index("Index lock poisoned".to_string()))
    }

    fn ensure_loaded(&self, slot: &mut Slot) {
        if matches!(slot, Slot::Uninitialized) {
            *slot = self.load_persisted();
        }
    }

    fn load_persisted(&self) -> Slot {
        let Some(path) = self.persist_path.as_deref() else {
            return Slot::Empty;
        };

        if !index_exists(path) {
            debug!("No persisted index at {}", path.display());
            return Slot::Empty;
        }

        let model_id = self.embedder.model_id();
        let expected = LoadExpectations {
            model_id: &model_id,
            metric: self.metric,
        };

        match VectorIndex::load(path, expected) {
            Ok(index) => {
                info!(
                    "Loaded index with {} chunks from {}",
                    index.len(),
                    path.display()
                );
                Slot::Populated(index)
            }
            Err(e) => {
                warn!(
                    "Ignoring persisted index at {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                Slot::Empty
            }
        }
    }

    fn persist(&self, index: &VectorIndex) -> Result<()> {
        match &self.persist_path {
            Some(path) => index.save(path, &self.embedder.model_id()),
            None => Ok(()),
        }
    }
}
