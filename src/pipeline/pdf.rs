//! PDF adapter: validate the source file, pull its text layer, persist
//! sidecars.
//!
//! ## Why spawn_blocking?
//!
//! `pdf-extract` walks the whole document synchronously and decodes content
//! streams on the CPU. Running it inside `tokio::task::spawn_blocking` keeps
//! the async workers free while a multi-hundred-page sheet is parsed.
//!
//! ## Why validate magic bytes?
//!
//! Suppliers routinely mislabel files (a Word export renamed to `.pdf`).
//! Checking the `%PDF` header before handing the file to the parser turns a
//! cryptic library error into a precise "not a PDF" message for that item.

use crate::error::{ItemError, SheetError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract the text layer of a PDF.
///
/// Returns [`ItemError::SourceUnavailable`] when the file cannot be read at
/// all and [`ItemError::TextExtraction`] when the PDF library fails or the
/// document has no usable text.
pub async fn extract_pdf_text(path: &Path) -> Result<String, ItemError> {
    validate_pdf_path(path)?;

    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| ItemError::TextExtraction {
            path: path.to_path_buf(),
            reason: format!("extraction task panicked: {e}"),
        })?
        .map_err(|e| ItemError::TextExtraction {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if text.trim().is_empty() {
        return Err(ItemError::TextExtraction {
            path: path.to_path_buf(),
            reason: "document has no text layer (scanned images only?)".into(),
        });
    }

    debug!(path = %path.display(), chars = text.len(), "extracted text layer");
    Ok(text)
}

/// Check existence, readability, and the `%PDF` magic bytes.
fn validate_pdf_path(path: &Path) -> Result<(), ItemError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(|e| ItemError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(ItemError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: format!("not a PDF file (first bytes: {magic:?})"),
        });
    }
    Ok(())
}

// ── Sidecar persistence ──────────────────────────────────────────────────

/// Paths of the files written next to an extraction.
#[derive(Debug, Clone)]
pub struct SavedText {
    pub text_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Metadata written alongside the extracted text.
#[derive(Debug, Serialize, Deserialize)]
pub struct TextMetadata {
    pub extraction_timestamp: DateTime<Utc>,
    pub original_file: PathBuf,
    pub file_size_bytes: Option<u64>,
    pub text_length: usize,
}

/// Persist the extracted text and a metadata sidecar under
/// `<output_dir>/<stem>/`.
///
/// Each source document gets its own folder so batch runs over a supplier's
/// whole catalogue stay navigable.
pub async fn persist_text(
    text: &str,
    original: &Path,
    output_dir: &Path,
) -> Result<SavedText, SheetError> {
    let stem = file_stem(original);
    let folder = output_dir.join(&stem);
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|e| SheetError::OutputDirUnavailable {
            path: folder.clone(),
            source: e,
        })?;

    let text_path = folder.join(format!("extracted_{stem}.txt"));
    atomic_write(&text_path, text.as_bytes()).await?;

    let metadata = TextMetadata {
        extraction_timestamp: Utc::now(),
        original_file: original.to_path_buf(),
        file_size_bytes: tokio::fs::metadata(original).await.ok().map(|m| m.len()),
        text_length: text.len(),
    };
    let metadata_path = folder.join(format!("metadata_{stem}.json"));
    let json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| SheetError::Internal(format!("metadata serialisation: {e}")))?;
    atomic_write(&metadata_path, &json).await?;

    info!(
        text = %text_path.display(),
        metadata = %metadata_path.display(),
        "saved extraction sidecars"
    );
    Ok(SavedText {
        text_path,
        metadata_path,
    })
}

/// Atomic write: temp file + rename, so readers never observe a torn file.
pub(crate) async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), SheetError> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| SheetError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SheetError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// File stem, falling back to the whole file name for dotfiles and the like.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}
