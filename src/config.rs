//! Configuration types for product-sheet extraction.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across workers, serialise the relevant parts for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! The config is constructed once and passed by reference into every
//! component — there is no ambient global state and nothing is read from the
//! environment inside the library (the CLI maps env vars to flags itself).

use crate::backend::ModelBackend;
use crate::error::SheetError;
use crate::progress::BatchProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use techsheet_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("llama3.1:latest")
///     .max_attempts(5)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the local model server. Default: `http://localhost:11434`.
    pub endpoint: String,

    /// Model identifier passed to the backend. Default: `llama3.1:latest`.
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what the sheet actually
    /// says — exactly what you want for extraction. Higher values introduce
    /// creativity that shows up as invented ingredients.
    pub temperature: f32,

    /// Maximum tokens the model may generate per attempt. Default: 4096.
    ///
    /// Dense sheets (long ingredient lists, full nutrition tables) can need
    /// 2 000+ output tokens. Setting this too low truncates the JSON
    /// mid-object and burns an attempt on an unparseable response.
    pub max_output_tokens: usize,

    /// Maximum model invocations per item. Default: 3. Must be ≥ 1.
    ///
    /// Each attempt is one external model call — costly, so counted and
    /// capped. Retries reuse the source text but append a repair hint
    /// describing the previous failure.
    pub max_attempts: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s, so concurrent workers
    /// recovering from an endpoint hiccup don't all retry at the same instant.
    pub retry_backoff_ms: u64,

    /// Number of batch items processed concurrently. Default: 4.
    ///
    /// The workload is dominated by model inference latency, not CPU, so a
    /// small worker pool cuts wall-clock time without overwhelming a single
    /// local endpoint. Items are independent; lower this if the endpoint
    /// starts refusing connections.
    pub concurrency: usize,

    /// Per-request timeout for model calls, in seconds. Default: 120.
    ///
    /// Local models on modest hardware can take a minute per sheet; a
    /// timeout shorter than generation time turns every item into a retry
    /// storm.
    pub request_timeout_secs: u64,

    /// Directory where per-sheet text, metadata, and results are written.
    /// Default: `./extracted_data`.
    pub output_dir: PathBuf,

    /// Persist the raw extracted text and a metadata sidecar next to the
    /// result. Default: true.
    pub save_text: bool,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Pre-constructed model backend. Takes precedence over `endpoint` +
    /// `model`; used by tests and by callers that need custom middleware.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Optional progress callback for batch runs.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".into(),
            model: "llama3.1:latest".into(),
            temperature: 0.1,
            max_output_tokens: 4096,
            max_attempts: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            request_timeout_secs: 120,
            output_dir: PathBuf::from("./extracted_data"),
            save_text: true,
            system_prompt: None,
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("save_text", &self.save_text)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ModelBackend>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn save_text(mut self, v: bool) -> Self {
        self.config.save_text = v;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, SheetError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(SheetError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(SheetError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.backend.is_none() {
            if c.endpoint.trim().is_empty() {
                return Err(SheetError::InvalidConfig("endpoint must not be empty".into()));
            }
            if !c.endpoint.starts_with("http://") && !c.endpoint.starts_with("https://") {
                return Err(SheetError::InvalidConfig(format!(
                    "endpoint must be an http(s) URL, got '{}'",
                    c.endpoint
                )));
            }
            if c.model.trim().is_empty() {
                return Err(SheetError::InvalidConfig("model must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.max_attempts, 3);
        assert!(config.save_text);
    }

    #[test]
    fn builder_clamps_floor_values() {
        let config = ExtractionConfig::builder()
            .max_attempts(0)
            .concurrency(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn malformed_endpoint_is_a_config_error() {
        let err = ExtractionConfig::builder()
            .endpoint("localhost:11434")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn empty_model_is_a_config_error() {
        let err = ExtractionConfig::builder().model("  ").build().unwrap_err();
        assert!(err.to_string().contains("model"));
    }
}
