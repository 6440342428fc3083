//! On-disk format of a [`VectorIndex`].
//!
//! An index directory holds a single `index.json` file made of two parts
//! separated by the first newline:
//!
//! 1. a one-line JSON manifest (format version, embedding model, metric,
//!    dimension, entry count, timestamps and a BLAKE3 checksum), then
//! 2. the JSON array of entries, byte-for-byte as checksummed.
//!
//! Files are written to a temporary file in the same directory and renamed
//! into place, so readers see either the previous index or the new one.


use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{IndexEntry, Metric, VectorIndex};
use crate::{RagError, Result};

pub const INDEX_FILE_NAME: &str = "index.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model_id: String,
    pub metric: Metric,
    pub dimension: usize,
    pub entry_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

/// What a loaded index must agree with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadExpectations<'a> {
    pub model_id: &'a str,
    pub metric: Metric,
}

/// Path of the index file inside an index directory
#[inline]
pub fn index_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE_NAME)
}

/// Whether a persisted index is present in `dir`
#[inline]
pub fn index_exists(dir: &Path) -> bool {
    index_file(dir).is_file()
}

impl VectorIndex {
    /// Atomically write the index into `dir`, creating it if needed
    #[inline]
    pub fn save(&self, dir: &Path, model_id: &str) -> Result<()> {
        let Some(dimension) = self.dimension.filter(|_| !self.entries.is_empty()) else {
            return Err(RagError::Persistence(
                "Refusing to save an empty index".to_string(),
            ));
        };

        fs::create_dir_all(dir).map_err(|e| {
            RagError::Persistence(format!(
                "Failed to create index directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let payload = serde_json::to_vec(&self.entries)
            .map_err(|e| RagError::Persistence(format!("Failed to serialize entries: {}", e)))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model_id: model_id.to_string(),
            metric: self.metric,
            dimension,
            entry_count: self.entries.len(),
            created_at: self.created_at,
            updated_at: Utc::now(),
            checksum: blake3::hash(&payload).to_hex().to_string(),
        };
        let header = serde_json::to_vec(&manifest)
            .map_err(|e| RagError::Persistence(format!("Failed to serialize manifest: {}", e)))?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(&header)?;
        temp_file.write_all(b"\n")?;
        temp_file.write_all(&payload)?;
        temp_file.as_file().sync_all()?;

        let target = index_file(dir);
        temp_file.persist(&target).map_err(|e| {
            RagError::Persistence(format!(
                "Failed to move index into place at {}: {}",
                target.display(),
                e.error
            ))
        })?;

        info!(
            "Saved index with {} entries to {}",
            manifest.entry_count,
            target.display()
        );
        Ok(())
    }

    /// Read an index from `dir`, rejecting anything that does not verify
    #[inline]
    pub fn load(dir: &Path, expected: LoadExpectations<'_>) -> Result<Self> {
        let path = index_file(dir);
        let bytes = fs::read(&path)?;

        let (manifest, payload) = split_file(&bytes)?;
        debug!(
            "Read index manifest from {}: version {}, {} entries",
            path.display(),
            manifest.format_version,
            manifest.entry_count
        );

        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::Persistence(format!(
                "Unsupported index format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }

        if manifest.model_id != expected.model_id {
            return Err(RagError::Persistence(format!(
                "Index was built with embedding model '{}', but '{}' is configured",
                manifest.model_id, expected.model_id
            )));
        }

        if manifest.metric != expected.metric {
            return Err(RagError::Persistence(format!(
                "Index uses the {} metric, but {} is configured",
                manifest.metric, expected.metric
            )));
        }

        let checksum = blake3::hash(payload).to_hex().to_string();
        if checksum != manifest.checksum {
            return Err(RagError::Persistence(
                "Index checksum mismatch, file is corrupted".to_string(),
            ));
        }

        let entries: Vec<IndexEntry> = serde_json::from_slice(payload)
            .map_err(|e| RagError::Persistence(format!("Failed to parse entries: {}", e)))?;

        if entries.is_empty() || entries.len() != manifest.entry_count {
            return Err(RagError::Persistence(format!(
                "Index declares {} entries but holds {}",
                manifest.entry_count,
                entries.len()
            )));
        }

        if manifest.dimension == 0
            || entries
                .iter()
                .any(|entry| entry.vector.len() != manifest.dimension)
        {
            return Err(RagError::Persistence(format!(
                "Index contains vectors that do not match dimension {}",
                manifest.dimension
            )));
        }

        Ok(Self {
            metric: manifest.metric,
            dimension: Some(manifest.dimension),
            entries,
            created_at: manifest.created_at,
        })
    }
}

fn split_file(bytes: &[u8]) -> Result<(Manifest, &[u8])> {
    let newline = bytes
        .iter()
        .position(|byte| *byte == b'\n')
        .ok_or_else(|| RagError::Persistence("Index file has no manifest line".to_string()))?;

    let (header, rest) = bytes.split_at(newline);
    let manifest: Manifest = serde_json::from_slice(header)
        .map_err(|e| RagError::Persistence(format!("Failed to parse manifest: {}", e)))?;

    Ok((manifest, &rest[1..]))
}
