// Text extraction module
// Turns uploaded files into raw text; failures degrade to "no text"


use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];
const PAGINATED_EXTENSIONS: &[&str] = &["pdf"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("File is not valid UTF-8: {0}")]
    Decode(PathBuf),
    #[error("Failed to parse PDF {path}: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// File formats the extractor understands, keyed by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Pdf,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();

        if PLAIN_TEXT_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::PlainText)
        } else if PAGINATED_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// Extract text, reporting why nothing could be read
#[inline]
pub fn try_extract(path: &Path) -> Result<String, ExtractError> {
    match FileKind::from_path(path) {
        Some(FileKind::PlainText) => read_plain_text(path),
        Some(FileKind::Pdf) => read_pdf(path),
        None => Err(ExtractError::Unsupported(path.to_path_buf())),
    }
}

/// Extract text from a file, returning an empty string when it cannot be read
#[inline]
pub fn extract_text(path: &Path) -> String {
    match try_extract(path) {
        Ok(text) => text,
        Err(ExtractError::Unsupported(_)) => {
            debug!("Skipping unsupported file {}", path.display());
            String::new()
        }
        Err(e) => {
            warn!("Text extraction failed: {}", e);
            String::new()
        }
    }
}

fn read_plain_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    String::from_utf8(bytes).map_err(|_| ExtractError::Decode(path.to_path_buf()))
}

/// Page texts in page order, joined by newlines. Pages without extractable
/// text contribute an empty line.
///
/// The PDF parser asserts on some malformed inputs, so parsing runs behind
/// `catch_unwind` and a panic counts as a parse failure.
fn read_pdf(path: &Path) -> Result<String, ExtractError> {
    let document = guard_parser(|| lopdf::Document::load(path))
        .and_then(|loaded| loaded.map_err(|e| e.to_string()))
        .map_err(|message| ExtractError::Pdf {
            path: path.to_path_buf(),
            message,
        })?;

    let pages = document.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());

    for page_number in pages.keys() {
        let extracted = guard_parser(|| document.extract_text(&[*page_number]))
            .and_then(|text| text.map_err(|e| e.to_string()));

        match extracted {
            Ok(text) => page_texts.push(text.trim_end_matches(['\r', '\n']).to_string()),
            Err(message) => {
                debug!(
                    "No text on page {} of {}: {}",
                    page_number,
                    path.display(),
                    message
                );
                page_texts.push(String::new());
            }
        }
    }

    debug!(
        "Extracted {} pages from PDF {}",
        page_texts.len(),
        path.display()
    );

    Ok(page_texts.join("\n"))
}

/// Run a parser call, turning a panic into an error message
fn guard_parser<T>(parse: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(parse)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        format!("parser panicked: {}", detail)
    })
}
