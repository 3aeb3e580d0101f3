//! Batch-orchestration tests against the public API.
//!
//! These run fully offline: a content-keyed mock backend stands in for the
//! model server, so the batch independence, counting, and persistence
//! guarantees can be asserted deterministically regardless of completion
//! order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use techsheet_extract::{
    extract_batch, write_batch_report, write_result, BatchReport, CompletionRequest,
    ExtractionConfig, ItemError, ModelBackend,
};

/// Answers by matching a marker substring in the user message, so responses
/// stay attached to the right item no matter which worker picks it up.
struct KeyedBackend {
    responses: HashMap<&'static str, String>,
}

#[async_trait]
impl ModelBackend for KeyedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ItemError> {
        for (marker, response) in &self.responses {
            if request.user.contains(marker) {
                return Ok(response.clone());
            }
        }
        Err(ItemError::InferenceUnavailable {
            reason: "no scripted response for this sheet".into(),
        })
    }
}

fn valid_json(name: &str) -> String {
    format!(
        r#"{{"product_name": "{name}", "ean_code": "3288310840869",
            "ingredients": ["pommes"], "allergens": [],
            "nutritional_values": [{{"name": "Énergie", "per_100g": "285 kJ"}}]}}"#
    )
}

fn write_sheet(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

fn config_with(backend: Arc<dyn ModelBackend>, output_dir: &Path) -> ExtractionConfig {
    ExtractionConfig::builder()
        .backend(backend)
        .max_attempts(2)
        .retry_backoff_ms(0)
        .concurrency(4)
        .output_dir(output_dir)
        .build()
        .unwrap()
}

#[tokio::test]
async fn one_failing_item_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = [
        ("one.txt", "sheet ALPHA"),
        ("two.txt", "sheet BRAVO"),
        ("three.txt", "sheet CHARLIE"),
        ("four.txt", "sheet DELTA"),
        ("five.txt", "sheet ECHO"),
    ]
    .iter()
    .map(|(file, content)| write_sheet(dir.path(), file, content))
    .collect();

    let backend = Arc::new(KeyedBackend {
        responses: HashMap::from([
            ("ALPHA", valid_json("Alpha")),
            ("BRAVO", valid_json("Bravo")),
            // CHARLIE always gets structurally invalid output.
            ("CHARLIE", "this is not the JSON you asked for".to_string()),
            ("DELTA", valid_json("Delta")),
            ("ECHO", valid_json("Echo")),
        ]),
    });
    let config = config_with(backend, dir.path());

    let report = extract_batch(&paths, &config).await.unwrap();

    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.results.len(), 5, "every input appears in the mapping");

    for (source, result) in &report.results {
        // success iff a record is present, in every entry
        assert_eq!(result.success, result.record.is_some(), "at {source}");
        if result.success {
            assert!(!result.record.as_ref().unwrap().product_name.is_empty());
            assert!(result.confidence_score > 0.0);
        } else {
            assert!(source.contains("three"));
            assert!(!result.errors.is_empty());
            assert_eq!(result.confidence_score, 0.0);
        }
    }
}

#[tokio::test]
async fn unreadable_source_is_an_item_failure_not_a_batch_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write_sheet(dir.path(), "ok.txt", "sheet ALPHA"),
        dir.path().join("missing.txt"),
    ];

    let backend = Arc::new(KeyedBackend {
        responses: HashMap::from([("ALPHA", valid_json("Alpha"))]),
    });
    let config = config_with(backend, dir.path());

    let report = extract_batch(&paths, &config).await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    let failed = report.results.values().find(|r| !r.success).unwrap();
    assert!(failed.errors[0].contains("Source unavailable"));
}

#[tokio::test]
async fn report_and_results_persist_and_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let paths = vec![write_sheet(dir.path(), "compote.txt", "sheet ALPHA")];

    let backend = Arc::new(KeyedBackend {
        responses: HashMap::from([("ALPHA", valid_json("Compote pomme"))]),
    });
    let config = config_with(backend, &out);

    let report = extract_batch(&paths, &config).await.unwrap();

    for (source, result) in &report.results {
        write_result(result, Path::new(source), &out).await.unwrap();
    }
    let summary_path = write_batch_report(&report, &out).await.unwrap();

    let back: BatchReport =
        serde_json::from_slice(&tokio::fs::read(&summary_path).await.unwrap()).unwrap();
    assert_eq!(back.attempted, report.attempted);
    assert_eq!(back.succeeded, report.succeeded);
    assert_eq!(back.results.len(), 1);

    let result_path = out.join("compote").join("result_compote.json");
    assert!(result_path.exists(), "per-sheet result file written");
}

#[tokio::test]
async fn richer_sheets_score_higher_than_sparse_ones() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write_sheet(dir.path(), "rich.txt", "sheet ALPHA"),
        write_sheet(dir.path(), "sparse.txt", "sheet BRAVO"),
    ];

    let backend = Arc::new(KeyedBackend {
        responses: HashMap::from([
            ("ALPHA", valid_json("Alpha")),
            ("BRAVO", r#"{"product_name": "Bravo"}"#.to_string()),
        ]),
    });
    let config = config_with(backend, dir.path());

    let report = extract_batch(&paths, &config).await.unwrap();
    let rich = &report.results[&paths[0].display().to_string()];
    let sparse = &report.results[&paths[1].display().to_string()];

    assert!(rich.confidence_score > sparse.confidence_score);
    assert!(sparse.confidence_score > 0.0);
    assert!(
        sparse.record.as_ref().unwrap().allergens.is_empty(),
        "no allergen info means an empty sequence, not a missing field"
    );
}
