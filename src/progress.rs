//! Progress-callback trait for batch extraction events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the batch processes each source document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a database row, or a terminal progress bar
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so it works correctly when items
//! are processed concurrently.

use std::sync::Arc;

/// Called by the batch orchestrator as it processes each item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When `concurrency > 1`, the per-item methods may be
/// called concurrently from different tasks; implementations must guard
/// shared mutable state.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any item is processed.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called just before an item's pipeline starts.
    fn on_item_start(&self, source: &str, total_items: usize) {
        let _ = (source, total_items);
    }

    /// Called when an item finishes successfully, with its confidence score.
    fn on_item_complete(&self, source: &str, total_items: usize, confidence: f64) {
        let _ = (source, total_items, confidence);
    }

    /// Called when an item fails after all attempts.
    fn on_item_failed(&self, source: &str, total_items: usize, error: &str) {
        let _ = (source, total_items, error);
    }

    /// Called once after every item has been attempted.
    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        let _ = (total_items, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
