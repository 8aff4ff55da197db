//! Error types for the cleaning service.
//!
//! Every failure the store, tracker, pipeline or import coordinator can
//! produce is a variant of [`CleaningError`]. All of them are recoverable at
//! the API boundary: the server turns them into an `error` envelope carrying
//! the [`Display`](std::fmt::Display) text as `message` and
//! [`CleaningError::error_code`] as `code`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::types::{DatasetId, JobId, OperationId, OperationKind};

/// The main error type for the cleaning service.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// Unknown dataset id.
    #[error("Dataset '{0}' not found")]
    DatasetNotFound(DatasetId),

    /// Unknown operation id.
    #[error("Operation '{0}' not found")]
    OperationNotFound(OperationId),

    /// Unknown import job id.
    #[error("Import job '{0}' not found")]
    JobNotFound(JobId),

    /// Another operation is already running on the dataset.
    #[error("Operation '{running}' is already running on dataset '{dataset_id}'")]
    Conflict {
        dataset_id: DatasetId,
        running: OperationKind,
    },

    /// A write presented a stale dataset version.
    #[error("Dataset '{dataset_id}' changed: expected version {expected}, found {actual}")]
    VersionConflict {
        dataset_id: DatasetId,
        expected: u64,
        actual: u64,
    },

    /// Uploaded content could not be parsed into rows and columns.
    #[error("Failed to parse file: {0}")]
    ParseError(String),

    /// Uploaded content was empty.
    #[error("File is empty")]
    EmptyInput,

    /// The file extension is not one we can parse.
    #[error("Invalid file type '{0}'. Allowed types: csv, json.")]
    UnsupportedFormat(String),

    /// Unknown or incomplete fill strategy.
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    /// Schedule time is malformed or not in the future.
    #[error("Invalid schedule time: {0}")]
    InvalidSchedule(String),

    /// The host's wall-clock budget for an operation was exceeded.
    #[error("Operation '{kind}' exceeded its time budget of {budget_secs}s")]
    Timeout { kind: OperationKind, budget_secs: u64 },

    /// The operation record already reached a terminal state.
    #[error("Operation '{0}' has already finished")]
    OperationFinished(OperationId),

    /// The import job is no longer in the `scheduled` state.
    #[error("Import job '{0}' is not scheduled")]
    JobNotScheduled(JobId),

    /// A row does not have one value per column.
    #[error("Row {row} has {found} values but the dataset has {expected} columns")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Invalid per-call parameter or configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (e.g., blocking task join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatasetNotFound(_) | Self::OperationNotFound(_) | Self::JobNotFound(_) => {
                "NOT_FOUND"
            }
            Self::Conflict { .. } => "CONFLICT",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::EmptyInput => "EMPTY_INPUT",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::InvalidStrategy(_) => "INVALID_STRATEGY",
            Self::InvalidSchedule(_) => "INVALID_SCHEDULE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::OperationFinished(_) => "OPERATION_FINISHED",
            Self::JobNotScheduled(_) => "JOB_NOT_SCHEDULED",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &CleaningError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is an unknown-id lookup failure.
    pub fn is_not_found(&self) -> bool {
        self.error_code() == "NOT_FOUND"
    }

    /// Check if the caller can fix the request and retry.
    ///
    /// Internal failures (IO, polars, join errors) are still reported through
    /// the error envelope, but retrying the same request will not help.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.root(),
            Self::Internal(_) | Self::Io(_) | Self::Polars(_) | Self::Json(_)
        )
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for CleaningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleaningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}
