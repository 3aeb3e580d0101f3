//! CLI binary for techsheet-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs single-file or batch extraction, and prints
//! results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use techsheet_extract::{
    extract_batch, write_batch_report, write_result, BatchProgressCallback, BatchReport,
    ExtractionConfig,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one ✓/✗ line per sheet.
/// Items complete out of order in concurrent mode, so everything goes
/// through the bar's `println` to keep the display coherent.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} sheets  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn short(source: &str) -> String {
        PathBuf::from(source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string())
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting extraction of {total_items} sheets…"))
        ));
    }

    fn on_item_start(&self, source: &str, _total: usize) {
        self.bar.set_message(Self::short(source));
    }

    fn on_item_complete(&self, source: &str, _total: usize, confidence: f64) {
        self.bar.println(format!(
            "  {} {:<40}  {}",
            green("✓"),
            Self::short(source),
            dim(&format!("confidence {confidence:.2}")),
        ));
        self.bar.inc(1);
    }

    fn on_item_failed(&self, source: &str, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<40}  {}",
            red("✗"),
            Self::short(source),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        let failed = total_items.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} sheets extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sheets extracted  ({} failed)",
                if failed == total_items {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_items,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One sheet
  techsheet fiche_compote.pdf

  # A whole supplier folder
  techsheet FT/charles_alice -o ./extracted_data

  # Pre-extracted text files, machine-readable report on stdout
  techsheet --text sheets/ --json > report.json

  # A bigger model, more patience
  techsheet --model llama3.1:70b --max-attempts 5 fiche.pdf

SETUP:
  1. Install and start Ollama:   ollama serve
  2. Pull a model:               ollama pull llama3.1:latest
  3. Extract:                    techsheet fiche.pdf

ENVIRONMENT VARIABLES:
  TECHSHEET_ENDPOINT      Model server base URL (default http://localhost:11434)
  TECHSHEET_MODEL         Model identifier (default llama3.1:latest)
  TECHSHEET_OUTPUT_DIR    Output directory (default ./extracted_data)

OUTPUT LAYOUT (per sheet, under the output directory):
  <stem>/extracted_<stem>.txt   raw text layer
  <stem>/metadata_<stem>.json   extraction metadata
  <stem>/result_<stem>.json     structured result + confidence score
  extraction_summary.json       aggregate batch report
"#;

/// Extract structured product data from PDF technical sheets using a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "techsheet",
    version,
    about = "Extract structured product data from PDF technical sheets using a local LLM",
    long_about = "Extract structured product-sheet data (name, EAN, ingredients, allergens, \
nutrition, manufacturer contact) from PDF technical sheets. PDFs are reduced to text, a \
locally hosted model (Ollama) turns the text into JSON, and each result carries a \
completeness-based confidence score.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF file, a text file, or a directory of sheets to process.
    input: PathBuf,

    /// Directory for extracted text, per-sheet results, and the batch summary.
    #[arg(short, long, env = "TECHSHEET_OUTPUT_DIR", default_value = "./extracted_data")]
    output_dir: PathBuf,

    /// Model server base URL.
    #[arg(long, env = "TECHSHEET_ENDPOINT", default_value = "http://localhost:11434")]
    endpoint: String,

    /// Model identifier.
    #[arg(long, env = "TECHSHEET_MODEL", default_value = "llama3.1:latest")]
    model: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "TECHSHEET_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max model output tokens per attempt.
    #[arg(long, env = "TECHSHEET_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Max model invocations per sheet.
    #[arg(long, env = "TECHSHEET_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Number of sheets processed concurrently.
    #[arg(short, long, env = "TECHSHEET_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-request model timeout in seconds.
    #[arg(long, env = "TECHSHEET_REQUEST_TIMEOUT", default_value_t = 120)]
    request_timeout: u64,

    /// When the input is a directory, pick up .txt sheets (pre-extracted
    /// text) instead of PDFs. Non-PDF files always skip the PDF stage.
    #[arg(long)]
    text: bool,

    /// Print the batch report as JSON on stdout instead of a summary.
    #[arg(long)]
    json: bool,

    /// Do not write the raw text / metadata sidecars.
    #[arg(long)]
    no_save_text: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Collect inputs ───────────────────────────────────────────────────
    let inputs = collect_inputs(&cli)?;
    if inputs.is_empty() {
        anyhow::bail!(
            "no {} files found in {}",
            if cli.text { "text" } else { "PDF" },
            cli.input.display()
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ExtractionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens)
        .max_attempts(cli.max_attempts)
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.request_timeout)
        .output_dir(cli.output_dir.clone())
        .save_text(!cli.no_save_text);

    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = extract_batch(&inputs, &config)
        .await
        .context("Extraction failed")?;

    // Persist per-sheet results and the aggregate summary.
    for (source, result) in &report.results {
        write_result(result, &PathBuf::from(source), &cli.output_dir)
            .await
            .with_context(|| format!("Failed to write result for {source}"))?;
    }
    let summary_path = write_batch_report(&report, &cli.output_dir)
        .await
        .context("Failed to write batch summary")?;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes()).context("stdout write")?;
        handle.write_all(b"\n").ok();
    } else if !cli.quiet {
        print_summary(&report);
        eprintln!("   summary: {}", dim(&summary_path.display().to_string()));
    }

    if report.succeeded == 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Expand the input path: a directory becomes its contained sheets.
fn collect_inputs(cli: &Cli) -> Result<Vec<PathBuf>> {
    let input = &cli.input;
    if !input.exists() {
        anyhow::bail!("input not found: {}", input.display());
    }
    if input.is_file() {
        return Ok(vec![input.clone()]);
    }

    let wanted_ext = if cli.text { "txt" } else { "pdf" };
    let mut files: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("Failed to read directory {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map_or(false, |e| e.eq_ignore_ascii_case(wanted_ext))
        })
        .collect();
    files.sort();
    if !files.is_empty() {
        eprintln!(
            "{} Found {} {} files in {}",
            cyan("◆"),
            files.len(),
            wanted_ext,
            input.display()
        );
    }
    Ok(files)
}

/// Human-readable batch summary, one line per failed sheet.
fn print_summary(report: &BatchReport) {
    eprintln!(
        "{}  {}/{} sheets  {}ms",
        if report.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.succeeded,
        report.attempted,
        report.duration_ms,
    );
    for (source, result) in &report.results {
        if !result.success {
            let reason = result
                .errors
                .last()
                .map(String::as_str)
                .unwrap_or("unknown error");
            eprintln!("   {} {}: {}", red("✗"), source, reason);
        }
    }
}
