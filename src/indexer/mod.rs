// Indexer module
// Coordinates extraction, chunking and store ingestion for batches of files


use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::embeddings::{Chunk, Document, TextSplitter};
use crate::extract::extract_text;
use crate::store::RagStore;

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files that contributed at least one chunk
    pub documents: usize,
    pub chunks: usize,
    /// Files that yielded no text, in input order
    pub skipped: Vec<PathBuf>,
}

/// Extract, chunk and index `paths` as a single batch.
///
/// Files without extractable text are recorded in the report and do not stop
/// the batch. All chunks reach the store in one call, so the index is written
/// at most once.
#[inline]
pub fn ingest_files<P: AsRef<Path>>(
    store: &RagStore,
    paths: &[P],
    splitter: &TextSplitter,
) -> Result<IngestReport> {
    info!("Ingesting {} files", paths.len());

    let (chunks, mut report) = collect_chunks(paths, splitter);
    report.chunks = store.ingest(chunks)?;

    info!(
        "Ingested {} chunks from {} documents, skipped {} files",
        report.chunks,
        report.documents,
        report.skipped.len()
    );
    Ok(report)
}

fn collect_chunks<P: AsRef<Path>>(paths: &[P], splitter: &TextSplitter) -> (Vec<Chunk>, IngestReport) {
    let mut chunks = Vec::new();
    let mut report = IngestReport::default();

    for path in paths {
        let path = path.as_ref();
        let text = extract_text(path);

        if text.trim().is_empty() {
            debug!("No text extracted from {}, skipping", path.display());
            report.skipped.push(path.to_path_buf());
            continue;
        }

        let document = Document::from_path(path, text);
        let document_chunks = splitter.split_document(&document);
        debug!(
            "Split {} into {} chunks",
            document.source,
            document_chunks.len()
        );

        if !document_chunks.is_empty() {
            report.documents += 1;
            chunks.extend(document_chunks);
        }
    }

    (chunks, report)
}

/// A store paired with the splitter used to feed it
pub struct Indexer {
    store: RagStore,
    splitter: TextSplitter,
}

impl Indexer {
    #[inline]
    pub fn new(store: RagStore, splitter: TextSplitter) -> Self {
        Self { store, splitter }
    }

    /// Open the configured store and build the configured splitter
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let splitter = TextSplitter::from_config(&config.chunking)?;
        let store = RagStore::from_config(config)?;
        Ok(Self::new(store, splitter))
    }

    #[inline]
    pub fn store(&self) -> &RagStore {
        &self.store
    }

    #[inline]
    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    #[inline]
    pub fn ingest_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<IngestReport> {
        ingest_files(&self.store, paths, &self.splitter)
    }
}
