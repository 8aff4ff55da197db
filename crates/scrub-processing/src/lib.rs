//! Data Cleaning Pipeline Library
//!
//! Versioned in-memory datasets, a per-dataset operation log, and the
//! cleaning transforms behind the scrub service.
//!
//! # Overview
//!
//! - **Dataset Store**: owns dataset content; writes carry the version they
//!   were computed from and stale writes are rejected
//! - **Progress Tracker**: one record per operation, at most one running
//!   operation per dataset, pollable fractional progress
//! - **Cleaning Pipeline**: duplicate removal, missing value imputation,
//!   normalization and outlier detection as pure transforms
//! - **Import Coordinator**: CSV/JSON parsing, dataset creation, scheduled
//!   import jobs and CSV export
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scrub_processing::{FillStrategy, ImportCoordinator, NormalizeMethod, Pipeline};
//!
//! let pipeline = Pipeline::builder().build()?;
//! let importer = ImportCoordinator::new(
//!     pipeline.store().clone(),
//!     pipeline.tracker().clone(),
//!     pipeline.config().clone(),
//! );
//!
//! let imported = importer.import_file("sales.csv", &std::fs::read("sales.csv")?)?;
//! let id = imported.dataset_id;
//!
//! pipeline.remove_duplicates(&id)?;
//! pipeline.fill_missing(&id, FillStrategy::Mean)?;
//! pipeline.normalize(&id, NormalizeMethod::MinMax)?;
//! let outliers = pipeline.detect_outliers(&id, Some(3.0))?;
//!
//! for record in pipeline.tracker().progress(&id) {
//!     println!("{} {:?}", record.operation_kind, record.status);
//! }
//! ```
//!
//! # Concurrency
//!
//! All shared types are `Send + Sync`. Operations on different datasets run
//! in parallel; a second operation on a dataset that already has one running
//! fails with [`CleaningError::Conflict`] instead of waiting.

pub mod config;
pub mod dataset;
pub mod error;
pub mod import;
pub mod pipeline;
pub mod store;
pub mod tracker;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{CleaningConfig, CleaningConfigBuilder, ConfigValidationError};
pub use dataset::{ColumnKind, Dataset, Row, Value};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use import::{FileFormat, ImportCoordinator, ImportSummary, ParsedTable, parse_schedule_time};
pub use pipeline::{
    CleaningOp, ClosureProgressReporter, ColumnFill, DedupSummary, FillStrategy, FillSummary,
    NoopReporter, NormalizeMethod, NormalizeSummary, OperationOutcome, OutlierReport, Pipeline,
    PipelineBuilder, ProgressReporter, ProgressUpdate, Transform,
};
pub use store::{DatasetInfo, DatasetStore};
pub use tracker::{ProgressTracker, TrackerReporter};
pub use types::{
    DatasetId, ImportJob, ImportStats, JobId, JobStatus, OperationId, OperationKind,
    OperationRecord, OperationStatus,
};
