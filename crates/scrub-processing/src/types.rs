//! Identifiers, operation records and import jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque identifier of an imported dataset (the API's `file_id`).
    DatasetId
);
string_id!(
    /// Identifier of one operation record in the progress tracker.
    OperationId
);
string_id!(
    /// Identifier of a scheduled import job.
    JobId
);

// ============================================================================
// Operation records
// ============================================================================

/// Kinds of operation tracked per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Import,
    Dedup,
    FillMissing,
    Normalize,
    DetectOutliers,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Dedup => "dedup",
            Self::FillMissing => "fill_missing",
            Self::Normalize => "normalize",
            Self::DetectOutliers => "detect_outliers",
        }
    }

    /// Human-readable name used in progress messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Import => "Import",
            Self::Dedup => "Remove Duplicates",
            Self::FillMissing => "Fill Missing",
            Self::Normalize => "Normalize Data",
            Self::DetectOutliers => "Detect Outliers",
        }
    }

    /// Whether the operation may write new rows to the dataset.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::DetectOutliers)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an operation: `pending -> running -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Terminal states are final; a failed operation is resubmitted as a new record.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One entry of a dataset's operation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub dataset_id: DatasetId,
    pub operation_kind: OperationKind,
    pub status: OperationStatus,
    /// Fractional completion (0.0 - 1.0).
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
    /// Operation-specific result payload, or the error summary on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Scheduled imports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Fired,
    Cancelled,
}

/// A deferred import waiting for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: JobId,
    pub scheduled_time: DateTime<Utc>,
    /// Where the scheduler reads the content from (a local path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
    /// Dataset produced by the firing, if the import succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw import counters; rendering them as a percentage is up to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_files: usize,
    pub total_rows: usize,
    pub scheduled_jobs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(DatasetId::new(), DatasetId::new());
        assert_ne!(JobId::new().as_str(), JobId::new().as_str());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = DatasetId::from("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn test_operation_kind_json_values() {
        let expectations = [
            (OperationKind::Import, "\"import\""),
            (OperationKind::Dedup, "\"dedup\""),
            (OperationKind::FillMissing, "\"fill_missing\""),
            (OperationKind::Normalize, "\"normalize\""),
            (OperationKind::DetectOutliers, "\"detect_outliers\""),
        ];

        for (kind, expected) in expectations {
            assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
            assert_eq!(format!("\"{}\"", kind), expected);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_only_outlier_detection_is_read_only() {
        assert!(!OperationKind::DetectOutliers.is_mutating());
        assert!(OperationKind::Dedup.is_mutating());
        assert!(OperationKind::FillMissing.is_mutating());
    }
}
