//! Error types for the techsheet-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SheetError`] — **Fatal**: the run cannot proceed at all (invalid
//!   configuration, unwritable output directory). Returned as
//!   `Err(SheetError)` from the top-level `extract_*` functions before any
//!   item is processed.
//!
//! * [`ItemError`] — **Non-fatal**: a single source document failed
//!   (unreadable file, model endpoint down, output never validated). Recorded
//!   as strings inside [`crate::schema::ExtractionResult::errors`] so one bad
//!   sheet never aborts a batch.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! item failure, log and continue, or collect everything for a post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the techsheet-extract library.
///
/// Item-level failures use [`ItemError`] and are recorded in
/// [`crate::schema::ExtractionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The output directory could not be created or written.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a result or summary file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client for the model endpoint could not be constructed.
    #[error("Failed to initialise model backend for '{endpoint}': {reason}")]
    BackendInit { endpoint: String, reason: String },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single source document.
///
/// Every variant is caught at the item boundary and stringified into the
/// item's [`crate::schema::ExtractionResult`]. [`ItemError::is_retryable`]
/// decides whether the extraction loop spends another model invocation on it.
#[derive(Debug, Clone, Error)]
pub enum ItemError {
    /// The input file could not be read at all.
    #[error("Source unavailable: '{path}': {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The file was readable but the PDF library produced no text.
    #[error("Text extraction failed for '{path}': {reason}")]
    TextExtraction { path: PathBuf, reason: String },

    /// The model endpoint was unreachable, timed out, or answered with a
    /// transport-level error. Retryable.
    #[error("Model backend unavailable: {reason}")]
    InferenceUnavailable { reason: String },

    /// Model output did not conform to the target shape. Retryable with a
    /// repair hint describing the defect.
    #[error("Output validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// Output parsed but a required field is missing or empty. Treated as
    /// a validation failure for retry purposes.
    #[error("Incomplete record: missing required field '{field}'")]
    IncompleteRecord { field: &'static str },
}

impl ItemError {
    /// Whether another model invocation could plausibly fix this failure.
    ///
    /// Source-level failures are final for the item: re-asking the model
    /// cannot make an unreadable file readable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ItemError::InferenceUnavailable { .. }
                | ItemError::ValidationFailed { .. }
                | ItemError::IncompleteRecord { .. }
        )
    }

    /// The repair hint appended to the next attempt's instruction, if this
    /// failure is one the model itself can correct.
    pub fn repair_reason(&self) -> Option<String> {
        match self {
            ItemError::ValidationFailed { reason } => Some(reason.clone()),
            ItemError::IncompleteRecord { field } => {
                Some(format!("required field '{field}' was missing or empty"))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_unavailable_display() {
        let e = ItemError::SourceUnavailable {
            path: PathBuf::from("missing.pdf"),
            reason: "No such file or directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("missing.pdf"), "got: {msg}");
    }

    #[test]
    fn retryability_matches_taxonomy() {
        assert!(ItemError::InferenceUnavailable {
            reason: "connection refused".into()
        }
        .is_retryable());
        assert!(ItemError::ValidationFailed {
            reason: "invalid JSON".into()
        }
        .is_retryable());
        assert!(ItemError::IncompleteRecord {
            field: "product_name"
        }
        .is_retryable());
        assert!(!ItemError::SourceUnavailable {
            path: PathBuf::from("x.pdf"),
            reason: "gone".into()
        }
        .is_retryable());
    }

    #[test]
    fn repair_reason_only_for_model_fixable_failures() {
        assert!(ItemError::InferenceUnavailable {
            reason: "timeout".into()
        }
        .repair_reason()
        .is_none());

        let reason = ItemError::IncompleteRecord {
            field: "product_name",
        }
        .repair_reason()
        .unwrap();
        assert!(reason.contains("product_name"));
    }

    #[test]
    fn invalid_config_display() {
        let e = SheetError::InvalidConfig("max_attempts must be ≥ 1".into());
        assert!(e.to_string().contains("max_attempts"));
    }
}
