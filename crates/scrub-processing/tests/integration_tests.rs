//! Integration tests for the data cleaning pipeline.
//!
//! These tests drive imports and cleaning operations end to end through the
//! public API, using the fixtures under `tests/fixtures`.

use pretty_assertions::assert_eq;
use scrub_processing::{
    CleaningConfig, CleaningError, CleaningOp, DatasetId, FillStrategy, ImportCoordinator,
    JobStatus, NormalizeMethod, OperationKind, OperationStatus, Pipeline, Value,
};
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn setup() -> (Pipeline, ImportCoordinator) {
    let pipeline = Pipeline::builder().build().unwrap();
    let importer = ImportCoordinator::new(
        pipeline.store().clone(),
        pipeline.tracker().clone(),
        CleaningConfig::default(),
    );
    (pipeline, importer)
}

fn import_fixture(importer: &ImportCoordinator, filename: &str) -> DatasetId {
    let content = std::fs::read(fixtures_path().join(filename)).expect("Failed to read fixture");
    importer
        .import_file(filename, &content)
        .expect("Failed to import fixture")
        .dataset_id
}

fn import_rows(pipeline: &Pipeline, columns: &[&str], rows: Vec<Vec<Value>>) -> DatasetId {
    pipeline
        .store()
        .create(columns.iter().map(|c| c.to_string()).collect(), rows)
        .unwrap()
}

fn column(pipeline: &Pipeline, id: &DatasetId, name: &str) -> Vec<Value> {
    let ds = pipeline.store().get(id).unwrap();
    let idx = ds.column_index(name).unwrap();
    ds.column_values(idx).cloned().collect()
}

// ============================================================================
// Documented Scenarios
// ============================================================================

#[test]
fn test_dedup_scenario() {
    let (pipeline, _) = setup();
    let id = import_rows(
        &pipeline,
        &["a", "b"],
        vec![
            vec![Value::from(1.0), Value::from(2.0)],
            vec![Value::from(1.0), Value::from(2.0)],
            vec![Value::from(3.0), Value::Missing],
        ],
    );

    let outcome = pipeline.remove_duplicates(&id).unwrap();
    assert_eq!(outcome.summary.duplicates_removed, 1);

    let ds = pipeline.store().get(&id).unwrap();
    assert_eq!(
        ds.rows,
        vec![
            vec![Value::from(1.0), Value::from(2.0)],
            vec![Value::from(3.0), Value::Missing],
        ]
    );
}

#[test]
fn test_fill_mean_scenario() {
    let (pipeline, _) = setup();
    let id = import_rows(
        &pipeline,
        &["b"],
        vec![
            vec![Value::from(2.0)],
            vec![Value::Missing],
            vec![Value::from(4.0)],
        ],
    );

    pipeline.fill_missing(&id, FillStrategy::Mean).unwrap();
    assert_eq!(
        column(&pipeline, &id, "b"),
        vec![Value::from(2.0), Value::from(3.0), Value::from(4.0)]
    );
}

#[test]
fn test_normalize_scenario() {
    let (pipeline, _) = setup();
    let id = import_rows(
        &pipeline,
        &["c"],
        vec![
            vec![Value::from(10.0)],
            vec![Value::from(20.0)],
            vec![Value::from(30.0)],
        ],
    );

    let outcome = pipeline.normalize(&id, NormalizeMethod::MinMax).unwrap();
    assert_eq!(outcome.summary.normalized_columns, vec!["c".to_string()]);
    assert_eq!(
        column(&pipeline, &id, "c"),
        vec![Value::from(0.0), Value::from(0.5), Value::from(1.0)]
    );
}

#[test]
fn test_outlier_scenario_from_json_upload() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "readings.json");
    let before = pipeline.store().version(&id).unwrap();

    let outcome = pipeline.detect_outliers(&id, Some(3.0)).unwrap();
    assert_eq!(outcome.summary.outliers_detected.get("d"), Some(&vec![4]));
    assert!(!outcome.summary.outliers_detected.contains_key("sensor"));
    assert_eq!(pipeline.store().version(&id).unwrap(), before);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_dedup_is_idempotent() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");

    let first = pipeline.remove_duplicates(&id).unwrap();
    assert_eq!(first.summary.duplicates_removed, 1);
    let after_first = pipeline.store().get(&id).unwrap();

    let second = pipeline.remove_duplicates(&id).unwrap();
    assert_eq!(second.summary.duplicates_removed, 0);
    assert!(!second.rewritten);

    let after_second = pipeline.store().get(&id).unwrap();
    assert_eq!(after_first.rows, after_second.rows);
    assert_eq!(after_first.version, after_second.version);
}

#[test]
fn test_fill_mean_leaves_non_numeric_missing() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");
    pipeline.remove_duplicates(&id).unwrap();

    let outcome = pipeline.fill_missing(&id, FillStrategy::Mean).unwrap();
    assert_eq!(outcome.summary.cells_filled, 3);

    let ds = pipeline.store().get(&id).unwrap();
    let age = ds.column_index("age").unwrap();
    let income = ds.column_index("income").unwrap();
    let city = ds.column_index("city").unwrap();
    assert_eq!(ds.missing_count(age), 0);
    assert_eq!(ds.missing_count(income), 0);
    assert_eq!(ds.missing_count(city), 1);
    assert_eq!(ds.rows[1][age], Value::from(39.4));
    assert_eq!(ds.rows[2][income], Value::from(59000.0));
}

#[test]
fn test_normalize_bounds_on_fixture() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");

    pipeline.normalize(&id, NormalizeMethod::MinMax).unwrap();
    let ds = pipeline.store().get(&id).unwrap();
    for idx in ds.numeric_columns() {
        let values: Vec<f64> = ds.numeric_values(idx).into_iter().map(|(_, v)| v).collect();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(values.contains(&0.0));
        assert!(values.contains(&1.0));
    }
}

#[test]
fn test_missing_dataset_is_not_found() {
    let (pipeline, _) = setup();
    let err = pipeline
        .fill_missing(&DatasetId::from("nope"), FillStrategy::Mode)
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_operation_conflicts_with_running_one() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");

    // Another caller holds the dataset.
    let running = pipeline
        .tracker()
        .begin(&id, OperationKind::Normalize)
        .unwrap();

    let err = pipeline.remove_duplicates(&id).unwrap_err();
    assert!(matches!(
        err,
        CleaningError::Conflict {
            running: OperationKind::Normalize,
            ..
        }
    ));
    assert_eq!(pipeline.store().version(&id).unwrap(), 0);

    pipeline
        .tracker()
        .complete(&running, serde_json::json!({}))
        .unwrap();
    assert!(pipeline.remove_duplicates(&id).is_ok());
}

#[test]
fn test_parallel_operations_on_one_dataset() {
    let (pipeline, _) = setup();
    let rows: Vec<Vec<Value>> = (0..20_000)
        .map(|i| vec![Value::from(i as f64), Value::from((i % 7) as f64)])
        .collect();
    let id = import_rows(&pipeline, &["x", "y"], rows);
    let pipeline = Arc::new(pipeline);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let id = id.clone();
            std::thread::spawn(move || pipeline.normalize(&id, NormalizeMethod::MinMax))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert!(succeeded >= 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, CleaningError::Conflict { .. }), "unexpected error: {}", e);
        }
    }

    // Only the first run rescales; later ones find nothing to change.
    let rewrites = results
        .iter()
        .filter(|r| matches!(r, Ok(outcome) if outcome.rewritten))
        .count();
    assert_eq!(rewrites, 1);
    assert_eq!(pipeline.store().version(&id).unwrap(), rewrites as u64);
    assert_eq!(pipeline.tracker().running_count(), 0);
}

#[test]
fn test_operations_on_different_datasets_are_independent() {
    let (pipeline, importer) = setup();
    let first = import_fixture(&importer, "customers.csv");
    let second = import_fixture(&importer, "customers.csv");

    pipeline
        .tracker()
        .begin(&first, OperationKind::FillMissing)
        .unwrap();
    assert!(pipeline.remove_duplicates(&second).is_ok());
}

// ============================================================================
// Progress History
// ============================================================================

#[test]
fn test_progress_history_records_each_operation() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");

    let ops = [
        CleaningOp::RemoveDuplicates,
        CleaningOp::FillMissing {
            strategy: FillStrategy::Median,
        },
        CleaningOp::Normalize {
            method: NormalizeMethod::MinMax,
        },
        CleaningOp::DetectOutliers { threshold: None },
    ];
    for op in &ops {
        op.run(&pipeline, &id).unwrap();
    }
    // Median skips the text column; mode fills it.
    pipeline.fill_missing(&id, FillStrategy::Mode).unwrap();

    let history = pipeline.tracker().progress(&id);
    let kinds: Vec<OperationKind> = history.iter().map(|r| r.operation_kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Import,
            OperationKind::Dedup,
            OperationKind::FillMissing,
            OperationKind::Normalize,
            OperationKind::DetectOutliers,
            OperationKind::FillMissing,
        ]
    );
    assert!(
        history
            .iter()
            .all(|r| r.status == OperationStatus::Completed && r.progress == 1.0)
    );
    assert!(history.windows(2).all(|w| w[0].started_at <= w[1].started_at));
}

#[test]
fn test_outlier_threshold_and_sample_size() {
    let (pipeline, _) = setup();
    let id = import_rows(&pipeline, &["n"], vec![vec![Value::from(1.0)]]);

    // Threshold validation happens before the record is created.
    assert!(pipeline.detect_outliers(&id, Some(0.0)).is_err());
    assert!(pipeline.tracker().progress(&id).is_empty());

    let strict = Pipeline::builder()
        .store(pipeline.store().clone())
        .tracker(pipeline.tracker().clone())
        .config(
            CleaningConfig::builder()
                .min_outlier_values(2)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    strict.detect_outliers(&id, None).unwrap();
    assert_eq!(
        strict.tracker().progress(&id)[0].status,
        OperationStatus::Completed
    );
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_import_rejects_unsupported_format() {
    let (_, importer) = setup();
    let err = importer.import_file("book.xlsx", b"PK\x03\x04").unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    assert_eq!(importer.import_stats().total_files, 0);
}

#[test]
fn test_import_reads_missing_markers() {
    let (pipeline, importer) = setup();
    let id = import_fixture(&importer, "customers.csv");

    let ds = pipeline.store().get(&id).unwrap();
    assert_eq!(ds.row_count(), 7);
    assert_eq!(ds.name.as_deref(), Some("customers.csv"));
    let income = ds.column_index("income").unwrap();
    assert_eq!(ds.missing_count(income), 2);
    assert_eq!(ds.rows[0][income], Value::from(52000.0));
    assert_eq!(ds.rows[0][ds.column_index("active").unwrap()], Value::Bool(true));
}

#[test]
fn test_schedule_lifecycle() {
    let (_, importer) = setup();

    assert!(matches!(
        importer.schedule_import("2001-09-09T01:46", None),
        Err(CleaningError::InvalidSchedule(_))
    ));

    let id = importer
        .schedule_import("2999-12-31T23:59", Some("customers.csv".to_string()))
        .unwrap();
    assert_eq!(importer.job(&id).unwrap().status, JobStatus::Scheduled);

    let far_future = scrub_processing::parse_schedule_time("3000-01-01T00:00").unwrap();
    let due = importer.due_jobs(far_future);
    assert_eq!(due.len(), 1);

    let content = std::fs::read(fixtures_path().join("customers.csv")).unwrap();
    let fired = importer.fire(&id, "customers.csv", &content).unwrap();
    assert_eq!(fired.status, JobStatus::Fired);
    assert!(fired.fired_at.is_some());
    assert!(importer.due_jobs(far_future).is_empty());

    assert!(matches!(
        importer.fire(&id, "customers.csv", &content),
        Err(CleaningError::JobNotScheduled(_))
    ));

    let stats = importer.import_stats();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.total_rows, 7);
    assert_eq!(stats.scheduled_jobs, 0);
}

#[test]
fn test_export_after_cleaning() {
    let (pipeline, importer) = setup();
    let id = import_rows(
        &pipeline,
        &["a", "b"],
        vec![
            vec![Value::from(1.0), Value::from("x")],
            vec![Value::from(1.0), Value::from("x")],
            vec![Value::Missing, Value::from("y")],
        ],
    );
    pipeline.remove_duplicates(&id).unwrap();
    pipeline
        .fill_missing(&id, FillStrategy::Constant(Value::from(0.0)))
        .unwrap();

    let csv = String::from_utf8(importer.export_csv(&id).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "a,b");
    assert!(lines[1].starts_with('1') && lines[1].ends_with(",x"));
    assert!(lines[2].starts_with('0') && lines[2].ends_with(",y"));
}
