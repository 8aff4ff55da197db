//! Upload parsing, dataset creation and scheduled imports.
//!
//! The coordinator turns raw file bytes into a dataset in the store and
//! records an `import` operation for it. It also owns the table of deferred
//! [`ImportJob`]s; the host decides when to fire them and where their content
//! comes from.

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::RwLock;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CleaningConfig;
use crate::dataset::{ColumnKind, Row, Value};
use crate::error::{CleaningError, Result, ResultExt};
use crate::store::DatasetStore;
use crate::tracker::ProgressTracker;
use crate::types::{DatasetId, ImportJob, ImportStats, JobId, JobStatus, OperationId, OperationKind};
use crate::utils::any_value_to_value;

// =============================================================================
// Formats
// =============================================================================

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// Detect the format from a file name's extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(CleaningError::UnsupportedFormat(extension)),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Column names and rows parsed from an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Read as missing any text cell that is one of the configured markers.
fn clean_cell(value: Value, config: &CleaningConfig) -> Value {
    match value {
        Value::Text(ref s) if s.trim().is_empty() || config.is_missing_marker(s) => Value::Missing,
        other => other,
    }
}

/// Marker spellings handed to the CSV reader, so numeric columns containing
/// `NA` or `null` are still inferred as numeric.
fn null_value_spellings(config: &CleaningConfig) -> Vec<PlSmallStr> {
    let mut spellings: Vec<String> = Vec::new();
    for marker in &config.missing_markers {
        let lower = marker.to_lowercase();
        let mut title = String::with_capacity(lower.len());
        for (i, c) in lower.chars().enumerate() {
            if i == 0 {
                title.extend(c.to_uppercase());
            } else {
                title.push(c);
            }
        }
        for spelling in [lower.clone(), lower.to_uppercase(), title] {
            if !spellings.contains(&spelling) {
                spellings.push(spelling);
            }
        }
    }
    spellings.into_iter().map(PlSmallStr::from).collect()
}

/// Parse CSV content with a header row. Types are inferred over the whole file.
pub fn parse_csv(content: &[u8], config: &CleaningConfig) -> Result<ParsedTable> {
    let parse_options =
        CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(
            null_value_spellings(config),
        )));

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(parse_options)
        .into_reader_with_file_handle(Cursor::new(content.to_vec()))
        .finish()
        .map_err(|e| CleaningError::ParseError(e.to_string()))?;

    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows: Vec<Row> = vec![Vec::with_capacity(columns.len()); df.height()];

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        for (i, row) in rows.iter_mut().enumerate() {
            let value = any_value_to_value(series.get(i)?);
            row.push(clean_cell(value, config));
        }
    }

    Ok(ParsedTable { columns, rows })
}

/// Parse a JSON array of objects.
///
/// Columns are the union of keys in first-appearance order; absent keys and
/// `null` become missing. Nested values are kept as their JSON text.
pub fn parse_json(content: &[u8], config: &CleaningConfig) -> Result<ParsedTable> {
    let json: serde_json::Value =
        serde_json::from_slice(content).map_err(|e| CleaningError::ParseError(e.to_string()))?;

    let records = json.as_array().ok_or_else(|| {
        CleaningError::ParseError("expected a JSON array of objects".to_string())
    })?;

    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            CleaningError::ParseError(format!("element {} is not an object", i))
        })?;
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(object);
    }

    let rows = objects
        .into_iter()
        .map(|object| {
            columns
                .iter()
                .map(|c| {
                    object
                        .get(c)
                        .map(|v| clean_cell(Value::from_json(v), config))
                        .unwrap_or(Value::Missing)
                })
                .collect()
        })
        .collect();

    Ok(ParsedTable { columns, rows })
}

/// Parse content in the given format, rejecting empty input.
pub fn parse_content(format: FileFormat, content: &[u8], config: &CleaningConfig) -> Result<ParsedTable> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(CleaningError::EmptyInput);
    }
    match format {
        FileFormat::Csv => parse_csv(content, config),
        FileFormat::Json => parse_json(content, config),
    }
}

/// Render a dataset as CSV with a header row.
pub fn to_csv(dataset: &crate::dataset::Dataset) -> Result<Vec<u8>> {
    let columns: Vec<Column> = dataset
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = PlSmallStr::from(name.as_str());
            let series = match dataset.column_kind(idx) {
                ColumnKind::Numeric => Series::new(
                    name,
                    dataset
                        .column_values(idx)
                        .map(Value::as_f64)
                        .collect::<Vec<Option<f64>>>(),
                ),
                ColumnKind::Boolean => Series::new(
                    name,
                    dataset
                        .column_values(idx)
                        .map(|v| match v {
                            Value::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<Vec<Option<bool>>>(),
                ),
                _ => Series::new(
                    name,
                    dataset
                        .column_values(idx)
                        .map(|v| (!v.is_missing()).then(|| v.to_string()))
                        .collect::<Vec<Option<String>>>(),
                ),
            };
            series.into_column()
        })
        .collect();

    let mut df = DataFrame::new(columns).context("Building export frame")?;
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)
        .context("Writing CSV")?;
    Ok(buffer)
}

/// Parse a schedule time: RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_schedule_time(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CleaningError::InvalidSchedule(format!(
                "'{}' is not a valid time, expected YYYY-MM-DDTHH:MM",
                input
            ))
        })
}

// =============================================================================
// Coordinator
// =============================================================================

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub dataset_id: DatasetId,
    pub operation_id: OperationId,
    pub filename: String,
    pub format: FileFormat,
    pub rows: usize,
    pub columns: Vec<String>,
    pub imported_at: DateTime<Utc>,
}

/// Creates datasets from uploads and owns scheduled import jobs.
#[derive(Debug)]
pub struct ImportCoordinator {
    store: Arc<DatasetStore>,
    tracker: Arc<ProgressTracker>,
    config: CleaningConfig,
    /// Jobs in creation order.
    jobs: RwLock<Vec<ImportJob>>,
}

static_assertions::assert_impl_all!(ImportCoordinator: Send, Sync);

impl ImportCoordinator {
    pub fn new(
        store: Arc<DatasetStore>,
        tracker: Arc<ProgressTracker>,
        config: CleaningConfig,
    ) -> Self {
        Self {
            store,
            tracker,
            config,
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Parse `content` according to `filename`'s extension and store it as a
    /// new dataset, recording a completed `import` operation.
    pub fn import_file(&self, filename: &str, content: &[u8]) -> Result<ImportSummary> {
        let format = FileFormat::from_filename(filename)?;
        let table = parse_content(format, content, &self.config)
            .context(format!("Importing '{}'", filename))?;

        let rows = table.rows.len();
        let dataset_id =
            self.store
                .create_named(Some(filename.to_string()), table.columns.clone(), table.rows)?;
        let operation_id = self.tracker.begin(&dataset_id, OperationKind::Import)?;
        self.tracker.complete(
            &operation_id,
            serde_json::json!({
                "filename": filename,
                "rows": rows,
                "columns": table.columns.len(),
            }),
        )?;

        let imported_at = self.store.get(&dataset_id)?.imported_at;
        info!(
            "Imported '{}' as dataset {} ({} rows, {} columns)",
            filename,
            dataset_id,
            rows,
            table.columns.len()
        );

        Ok(ImportSummary {
            dataset_id,
            operation_id,
            filename: filename.to_string(),
            format,
            rows,
            columns: table.columns,
            imported_at,
        })
    }

    /// Queue an import for a future time. No data is read now.
    pub fn schedule_import(&self, time: &str, source_reference: Option<String>) -> Result<JobId> {
        let scheduled_time = parse_schedule_time(time)?;
        let now = Utc::now();
        if scheduled_time <= now {
            return Err(CleaningError::InvalidSchedule(format!(
                "{} is not in the future",
                scheduled_time.to_rfc3339()
            )));
        }

        let job = ImportJob {
            id: JobId::new(),
            scheduled_time,
            source_reference,
            status: JobStatus::Scheduled,
            created_at: now,
            fired_at: None,
            dataset_id: None,
            error: None,
        };
        let id = job.id.clone();
        info!("Scheduled import {} for {}", id, scheduled_time.to_rfc3339());
        self.jobs.write().push(job);
        Ok(id)
    }

    /// Scheduled jobs whose time has come.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<ImportJob> {
        self.jobs
            .read()
            .iter()
            .filter(|j| j.status == JobStatus::Scheduled && j.scheduled_time <= now)
            .cloned()
            .collect()
    }

    /// All jobs, by scheduled time.
    pub fn jobs(&self) -> Vec<ImportJob> {
        let mut jobs = self.jobs.read().clone();
        jobs.sort_by_key(|j| j.scheduled_time);
        jobs
    }

    pub fn job(&self, id: &JobId) -> Result<ImportJob> {
        self.jobs
            .read()
            .iter()
            .find(|j| &j.id == id)
            .cloned()
            .ok_or_else(|| CleaningError::JobNotFound(id.clone()))
    }

    /// Cancel a job that has not fired yet.
    pub fn cancel_job(&self, id: &JobId) -> Result<ImportJob> {
        self.transition(id, |job| {
            job.status = JobStatus::Cancelled;
        })
        .inspect(|_| info!("Cancelled scheduled import {}", id))
    }

    /// Fire a job with the content read from its source.
    ///
    /// The job is marked fired before the import runs, so it can never fire
    /// twice. An import failure is recorded on the job rather than returned.
    pub fn fire(&self, id: &JobId, filename: &str, content: &[u8]) -> Result<ImportJob> {
        let now = Utc::now();
        self.transition(id, |job| {
            job.status = JobStatus::Fired;
            job.fired_at = Some(now);
        })?;

        let outcome = self.import_file(filename, content);
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| CleaningError::JobNotFound(id.clone()))?;
        match outcome {
            Ok(summary) => job.dataset_id = Some(summary.dataset_id),
            Err(e) => {
                warn!("Scheduled import {} failed: {}", id, e);
                job.error = Some(e.to_string());
            }
        }
        Ok(job.clone())
    }

    /// Mark a job fired without importing anything.
    pub fn mark_fired(&self, id: &JobId, error: Option<String>) -> Result<ImportJob> {
        let now = Utc::now();
        self.transition(id, |job| {
            job.status = JobStatus::Fired;
            job.fired_at = Some(now);
            job.error = error;
        })
    }

    /// Apply `change` to a job that is still scheduled.
    fn transition(&self, id: &JobId, change: impl FnOnce(&mut ImportJob)) -> Result<ImportJob> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| CleaningError::JobNotFound(id.clone()))?;
        if job.status != JobStatus::Scheduled {
            return Err(CleaningError::JobNotScheduled(id.clone()));
        }
        change(job);
        debug!("Import job {} is now {:?}", id, job.status);
        Ok(job.clone())
    }

    /// Raw import counters.
    pub fn import_stats(&self) -> ImportStats {
        ImportStats {
            total_files: self.store.len(),
            total_rows: self.store.total_rows(),
            scheduled_jobs: self
                .jobs
                .read()
                .iter()
                .filter(|j| j.status == JobStatus::Scheduled)
                .count(),
        }
    }

    /// Current content of a dataset as CSV.
    pub fn export_csv(&self, dataset_id: &DatasetId) -> Result<Vec<u8>> {
        let dataset = self.store.get(dataset_id)?;
        to_csv(&dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn coordinator() -> ImportCoordinator {
        ImportCoordinator::new(
            Arc::new(DatasetStore::new()),
            Arc::new(ProgressTracker::new()),
            CleaningConfig::default(),
        )
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_filename("a.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_filename("dir/b.json").unwrap(), FileFormat::Json);
        assert!(matches!(
            FileFormat::from_filename("c.xlsx"),
            Err(CleaningError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
        assert!(FileFormat::from_filename("noext").is_err());
    }

    #[test]
    fn test_parse_csv_types_and_missing() {
        let csv = b"a,b,name\n1,2,x\n1,NA,\n3,null,n/a\n";
        let table = parse_csv(csv, &CleaningConfig::default()).unwrap();

        assert_eq!(table.columns, vec!["a", "b", "name"]);
        assert_eq!(
            table.rows,
            vec![
                vec![Value::from(1.0), Value::from(2.0), Value::from("x")],
                vec![Value::from(1.0), Value::Missing, Value::Missing],
                vec![Value::from(3.0), Value::Missing, Value::Missing],
            ]
        );
    }

    #[test]
    fn test_parse_csv_nan_text_is_kept() {
        let table = parse_csv(b"name\nnan\nbob\n", &CleaningConfig::default()).unwrap();
        assert_eq!(
            table.rows,
            vec![vec![Value::from("nan")], vec![Value::from("bob")]]
        );
    }

    #[test]
    fn test_parse_csv_infinite_is_missing() {
        let table = parse_csv(b"c\n1\n2\ninf\n3\n\n", &CleaningConfig::default()).unwrap();
        let cells: Vec<Value> = table.rows.into_iter().map(|mut r| r.remove(0)).collect();
        assert_eq!(
            cells,
            vec![
                Value::from(1.0),
                Value::from(2.0),
                Value::Missing,
                Value::from(3.0),
                Value::Missing,
            ]
        );
    }

    #[test]
    fn test_parse_json_union_of_keys() {
        let json = br#"[{"a": 1, "b": 2}, {"b": null, "c": "x"}, {"a": {"n": 1}}]"#;
        let table = parse_json(json, &CleaningConfig::default()).unwrap();

        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(
            table.rows[1],
            vec![Value::Missing, Value::Missing, Value::from("x")]
        );
        assert_eq!(table.rows[2][0], Value::from("{\"n\":1}"));
    }

    #[test]
    fn test_parse_json_rejects_non_arrays() {
        assert!(matches!(
            parse_json(br#"{"a": 1}"#, &CleaningConfig::default()),
            Err(CleaningError::ParseError(_))
        ));
        assert!(matches!(
            parse_json(br#"[1, 2]"#, &CleaningConfig::default()),
            Err(CleaningError::ParseError(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let err = coordinator().import_file("empty.csv", b"  \n").unwrap_err();
        assert!(matches!(err.root(), CleaningError::EmptyInput));
    }

    #[test]
    fn test_import_creates_dataset_and_record() {
        let coord = coordinator();
        let summary = coord.import_file("data.csv", b"a,b\n1,2\n3,4\n").unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.format, FileFormat::Csv);
        let history = coord.tracker.progress(&summary.dataset_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation_kind, OperationKind::Import);
        assert_eq!(
            coord.import_stats(),
            ImportStats {
                total_files: 1,
                total_rows: 2,
                scheduled_jobs: 0
            }
        );
    }

    #[test]
    fn test_schedule_time_formats() {
        let t = parse_schedule_time("2030-05-01T10:30").unwrap();
        assert_eq!(t.to_rfc3339(), "2030-05-01T10:30:00+00:00");
        let t = parse_schedule_time("2030-05-01T10:30:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2030-05-01T08:30:00+00:00");
        assert!(matches!(
            parse_schedule_time("tomorrow"),
            Err(CleaningError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_schedule_rejects_past() {
        let err = coordinator()
            .schedule_import("2000-01-01T00:00", None)
            .unwrap_err();
        assert!(matches!(err, CleaningError::InvalidSchedule(_)));
    }

    #[test]
    fn test_fire_once() {
        let coord = coordinator();
        let id = coord
            .schedule_import("2999-01-01T00:00:00Z", Some("in.csv".to_string()))
            .unwrap();
        assert_eq!(coord.job(&id).unwrap().status, JobStatus::Scheduled);
        assert_eq!(coord.import_stats().scheduled_jobs, 1);
        assert!(coord.due_jobs(Utc::now()).is_empty());

        let job = coord.fire(&id, "in.csv", b"x\n1\n").unwrap();
        assert_eq!(job.status, JobStatus::Fired);
        assert!(job.dataset_id.is_some());

        assert!(matches!(
            coord.fire(&id, "in.csv", b"x\n1\n"),
            Err(CleaningError::JobNotScheduled(_))
        ));
        assert!(matches!(
            coord.cancel_job(&id),
            Err(CleaningError::JobNotScheduled(_))
        ));
    }

    #[test]
    fn test_fire_records_import_error() {
        let coord = coordinator();
        let id = coord.schedule_import("2999-01-01T00:00", None).unwrap();

        let job = coord.fire(&id, "in.xlsx", b"binary").unwrap();
        assert_eq!(job.status, JobStatus::Fired);
        assert!(job.dataset_id.is_none());
        assert!(job.error.unwrap().contains("xlsx"));
    }

    #[test]
    fn test_cancel_job() {
        let coord = coordinator();
        let id = coord.schedule_import("2999-01-01T00:00", None).unwrap();
        assert_eq!(coord.cancel_job(&id).unwrap().status, JobStatus::Cancelled);
        assert_eq!(coord.import_stats().scheduled_jobs, 0);
        assert!(coord.job(&JobId::from("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_export_csv() {
        let coord = coordinator();
        let summary = coord
            .import_file("data.json", br#"[{"n": 1.5, "s": "a"}, {"n": null, "s": "b"}]"#)
            .unwrap();

        let csv = String::from_utf8(coord.export_csv(&summary.dataset_id).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["n,s", "1.5,a", ",b"]);
    }
}
