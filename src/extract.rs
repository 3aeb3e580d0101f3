//! Eager extraction entry points: single documents and whole batches.
//!
//! This module sequences the pipeline stages — PDF text extraction, the
//! model retry loop, confidence scoring, persistence — and enforces the
//! error-propagation policy: fatal problems (bad configuration, unreachable
//! output directory) surface as `Err(SheetError)` before any item is
//! touched; everything that can go wrong for a *single* document is caught
//! at the item boundary and recorded inside its
//! [`ExtractionResult`], so one bad sheet never aborts a batch.
//!
//! Batch items are independent and are processed by a bounded worker pool
//! (`buffer_unordered`); the result mapping is complete and identical
//! regardless of completion order. Use [`crate::stream::extract_stream`]
//! when you want results progressively or need early cancellation.

use crate::backend::{ModelBackend, OllamaBackend};
use crate::config::ExtractionConfig;
use crate::error::SheetError;
use crate::pipeline::{llm, pdf};
use crate::schema::ExtractionResult;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of a batch run: one result per input plus aggregate counts.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// Keyed by the input path as given.
    pub results: BTreeMap<String, ExtractionResult>,
}

impl BatchReport {
    fn new(results: BTreeMap<String, ExtractionResult>, duration_ms: u64) -> Self {
        let attempted = results.len();
        let succeeded = results.values().filter(|r| r.success).count();
        Self {
            attempted,
            succeeded,
            failed: attempted - succeeded,
            duration_ms,
            results,
        }
    }
}

/// Extract a structured record from sheet text already in memory.
///
/// `source_name` is recorded as the record's provenance.
pub async fn extract_text(
    sheet_text: &str,
    source_name: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, SheetError> {
    let backend = resolve_backend(config)?;
    Ok(llm::run_extraction(&backend, sheet_text, source_name, config).await)
}

/// Run the full pipeline for one source document.
///
/// `.pdf` inputs go through text extraction first; anything else is read as
/// pre-extracted text. Item-level failures come back as a failed
/// [`ExtractionResult`], never as `Err`.
pub async fn extract_file(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, SheetError> {
    let backend = resolve_backend(config)?;
    Ok(process_source(&backend, path.as_ref(), config).await)
}

/// Process a batch of source documents with a bounded worker pool.
///
/// Every input path appears in the returned report exactly once. A single
/// endpoint serves all workers; endpoint-side throttling is absorbed by the
/// per-item retry loop rather than by serialising the batch.
pub async fn extract_batch(
    paths: &[PathBuf],
    config: &ExtractionConfig,
) -> Result<BatchReport, SheetError> {
    let start = Instant::now();
    let backend = resolve_backend(config)?;
    let total = paths.len();
    info!(items = total, concurrency = config.concurrency, "starting batch");

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let results: BTreeMap<String, ExtractionResult> = stream::iter(paths.iter().map(|path| {
        let backend = Arc::clone(&backend);
        let config = config.clone();
        let path = path.clone();
        async move {
            let source = path.display().to_string();
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_start(&source, total);
            }
            let result = process_source(&backend, &path, &config).await;
            if let Some(ref cb) = config.progress_callback {
                if result.success {
                    cb.on_item_complete(&source, total, result.confidence_score);
                } else {
                    let reason = result.errors.last().map(String::as_str).unwrap_or("unknown");
                    cb.on_item_failed(&source, total, reason);
                }
            }
            (source, result)
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    let report = BatchReport::new(results, start.elapsed().as_millis() as u64);
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "batch complete"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.succeeded);
    }

    Ok(report)
}

/// Write one item's result as pretty JSON under `<output_dir>/<stem>/`.
pub async fn write_result(
    result: &ExtractionResult,
    source: &Path,
    output_dir: &Path,
) -> Result<PathBuf, SheetError> {
    let stem = pdf::file_stem(source);
    let folder = output_dir.join(&stem);
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|e| SheetError::OutputDirUnavailable {
            path: folder.clone(),
            source: e,
        })?;

    let path = folder.join(format!("result_{stem}.json"));
    let json = serde_json::to_vec_pretty(result)
        .map_err(|e| SheetError::Internal(format!("result serialisation: {e}")))?;
    pdf::atomic_write(&path, &json).await?;
    debug!(path = %path.display(), "wrote extraction result");
    Ok(path)
}

/// Write the aggregate batch report as `extraction_summary.json`.
pub async fn write_batch_report(
    report: &BatchReport,
    output_dir: &Path,
) -> Result<PathBuf, SheetError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| SheetError::OutputDirUnavailable {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let path = output_dir.join("extraction_summary.json");
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| SheetError::Internal(format!("report serialisation: {e}")))?;
    pdf::atomic_write(&path, &json).await?;
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the model backend: a caller-provided one wins, otherwise an
/// Ollama client is built from the endpoint configuration.
pub(crate) fn resolve_backend(
    config: &ExtractionConfig,
) -> Result<Arc<dyn ModelBackend>, SheetError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    let backend = OllamaBackend::new(
        &config.endpoint,
        config.model.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(backend))
}

/// One item, end to end. Infallible at the type level: every failure mode
/// is folded into the returned result.
pub(crate) async fn process_source(
    backend: &Arc<dyn ModelBackend>,
    path: &Path,
    config: &ExtractionConfig,
) -> ExtractionResult {
    let source = path.display().to_string();
    let is_pdf = path
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("pdf"));

    let (text, mut pre_warnings) = if is_pdf {
        match pdf::extract_pdf_text(path).await {
            Ok(text) => {
                let mut warnings = Vec::new();
                if config.save_text {
                    if let Err(e) = pdf::persist_text(&text, path, &config.output_dir).await {
                        warnings.push(format!("could not save extracted text: {e}"));
                    }
                }
                (text, warnings)
            }
            Err(e) => return ExtractionResult::failed(vec![e.to_string()], Vec::new()),
        }
    } else {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => (text, Vec::new()),
            Err(e) => {
                return ExtractionResult::failed(
                    vec![format!("Source unavailable: '{}': {e}", path.display())],
                    Vec::new(),
                )
            }
        }
    };

    let mut result = llm::run_extraction(backend, &text, &source, config).await;
    if !pre_warnings.is_empty() {
        pre_warnings.extend(std::mem::take(&mut result.warnings));
        result.warnings = pre_warnings;
    }
    result
}
