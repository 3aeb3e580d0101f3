//! # techsheet-extract
//!
//! Extract structured product data from PDF technical sheets using a locally
//! hosted language model.
//!
//! ## Why this crate?
//!
//! Food suppliers publish product data as free-form PDF "fiches techniques":
//! the same facts (ingredients, allergen tables, nutrition, EAN codes) in a
//! different layout for every supplier. Template-based scraping breaks on
//! every new sheet. Instead this crate pulls the text layer out of the PDF
//! and lets a local model (Ollama) read it as a human would, validating the
//! output against a fixed record shape and scoring how complete the
//! extraction is.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Text    pull the text layer (pdf-extract, spawn_blocking)
//!  ├─ 2. Model   instruct a local LLM; retry with repair hints on bad output
//!  ├─ 3. Parse   lenient JSON repair + validation into ProductRecord
//!  ├─ 4. Score   weighted completeness score in [0, 1]
//!  └─ 5. Output  one ExtractionResult JSON per sheet + batch summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use techsheet_extract::{extract_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Expects an Ollama server on http://localhost:11434
//!     let config = ExtractionConfig::default();
//!     let result = extract_file("fiche_compote.pdf", &config).await?;
//!     if result.success {
//!         let record = result.record.unwrap();
//!         println!("{} (confidence {:.2})", record.product_name, result.confidence_score);
//!     } else {
//!         eprintln!("extraction failed: {:?}", result.errors);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `techsheet` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! techsheet-extract = { version = "0.3", default-features = false }
//! ```
//!
//! ## Error model
//!
//! Fatal configuration problems are `Err(SheetError)` from the entry points;
//! everything that can go wrong for a single sheet is recorded inside its
//! [`ExtractionResult`] so a batch always runs to completion.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod score;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{CompletionRequest, ModelBackend, OllamaBackend};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ItemError, SheetError};
pub use extract::{
    extract_batch, extract_file, extract_text, write_batch_report, write_result, BatchReport,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{
    Allergen, AllergenStatus, ExtractionResult, ManufacturerContact, NutritionalValue,
    ProductRecord,
};
pub use score::confidence_score;
pub use stream::{extract_stream, ResultStream};
