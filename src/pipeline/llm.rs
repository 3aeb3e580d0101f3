//! Model interaction: the attempt/retry/repair state machine.
//!
//! One call to [`run_extraction`] drives one source document from raw text
//! to a terminal [`ExtractionResult`]. The loop is a small explicit state
//! machine — Attempt → (Succeeded | Retry | Failed) — whose loop-carried
//! state is exactly three things: the attempt counter, the accumulated error
//! list, and the repair hint derived from the previous failure. Nothing else
//! persists between attempts.
//!
//! ## Retry Strategy
//!
//! Transport failures (endpoint down, timeout, HTTP 429/5xx) and validation
//! failures (malformed output, missing required field) are both retryable,
//! but only validation failures carry a repair hint: a transport error says
//! nothing the model could act on. Exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`) keeps concurrent workers from
//! hammering a recovering endpoint in lock-step. The loop never makes more
//! than `max_attempts` model invocations, under any failure pattern.

use crate::backend::{CompletionRequest, ModelBackend};
use crate::config::ExtractionConfig;
use crate::pipeline::parse;
use crate::prompts::{repair_hint, user_message, DEFAULT_SYSTEM_PROMPT};
use crate::schema::ExtractionResult;
use crate::score::confidence_score;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Extract a structured record from one sheet's text.
///
/// Always returns an `ExtractionResult` — item-level failures are recorded
/// in it, never propagated, so one bad sheet cannot abort a batch. Failure
/// reasons from earlier attempts are retained in `errors` even when a later
/// attempt succeeds.
pub async fn run_extraction(
    backend: &Arc<dyn ModelBackend>,
    sheet_text: &str,
    source_file: &str,
    config: &ExtractionConfig,
) -> ExtractionResult {
    let base_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let user = user_message(sheet_text);

    let mut errors: Vec<String> = Vec::new();
    let mut hint: Option<String> = None;

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 2);
            warn!(
                source = source_file,
                attempt,
                max = config.max_attempts,
                backoff_ms = backoff,
                "retrying extraction"
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let system = match &hint {
            Some(reason) => format!("{base_prompt}{}", repair_hint(reason)),
            None => base_prompt.to_string(),
        };

        let request = CompletionRequest {
            system,
            user: user.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        };

        let completion = match backend.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                errors.push(format!("attempt {attempt}: {e}"));
                // Transport errors carry no repair hint; keep the previous
                // one in case the last rejection was a validation failure.
                continue;
            }
        };

        match parse::parse_model_output(&completion, source_file) {
            Ok((record, warnings)) => {
                let score = confidence_score(&record);
                debug!(
                    source = source_file,
                    attempt,
                    confidence = score,
                    "extraction succeeded"
                );
                return ExtractionResult::succeeded(record, score, errors, warnings);
            }
            Err(e) => {
                hint = e.repair_reason();
                errors.push(format!("attempt {attempt}: {e}"));
            }
        }
    }

    warn!(
        source = source_file,
        attempts = config.max_attempts,
        "extraction failed after all attempts"
    );
    ExtractionResult::failed(errors, Vec::new())
}
