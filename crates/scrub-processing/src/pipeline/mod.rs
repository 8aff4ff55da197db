//! Cleaning pipeline.
//!
//! Each cleaning operation is a pure transform over a dataset snapshot that
//! returns a [`Transform`]: optionally a new set of rows, plus a typed
//! summary. [`Pipeline`] brackets a transform with the tracker and store so
//! that the result is written back with an optimistic version check.

mod builder;
pub mod dedup;
mod executor;
pub mod imputation;
pub mod normalize;
pub mod outliers;
pub mod progress;

use serde::{Deserialize, Serialize};

use crate::dataset::Row;
use crate::error::Result;
use crate::types::{DatasetId, OperationKind};

pub use builder::{Pipeline, PipelineBuilder};
pub use dedup::DedupSummary;
pub use executor::OperationOutcome;
pub use imputation::{ColumnFill, FillStrategy, FillSummary};
pub use normalize::{NormalizeMethod, NormalizeSummary};
pub use outliers::OutlierReport;
pub use progress::{ClosureProgressReporter, NoopReporter, ProgressReporter, ProgressUpdate};

/// Output of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<S> {
    /// Replacement rows, or `None` when the dataset should not be rewritten.
    pub rows: Option<Vec<Row>>,
    pub summary: S,
}

impl<S> Transform<S> {
    /// A transform that leaves the dataset as it is.
    pub fn unchanged(summary: S) -> Self {
        Self {
            rows: None,
            summary,
        }
    }

    pub fn rewrite(rows: Vec<Row>, summary: S) -> Self {
        Self {
            rows: Some(rows),
            summary,
        }
    }

    pub fn is_rewrite(&self) -> bool {
        self.rows.is_some()
    }
}

/// A cleaning request, as parsed from a CLI flag or API body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CleaningOp {
    RemoveDuplicates,
    FillMissing { strategy: FillStrategy },
    Normalize { method: NormalizeMethod },
    DetectOutliers { threshold: Option<f64> },
}

impl CleaningOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::RemoveDuplicates => OperationKind::Dedup,
            Self::FillMissing { .. } => OperationKind::FillMissing,
            Self::Normalize { .. } => OperationKind::Normalize,
            Self::DetectOutliers { .. } => OperationKind::DetectOutliers,
        }
    }

    /// Run this operation through `pipeline`, erasing the summary to JSON.
    pub fn run(
        &self,
        pipeline: &Pipeline,
        dataset_id: &DatasetId,
    ) -> Result<OperationOutcome<serde_json::Value>> {
        match self {
            Self::RemoveDuplicates => pipeline.remove_duplicates(dataset_id)?.into_json(),
            Self::FillMissing { strategy } => {
                pipeline.fill_missing(dataset_id, strategy.clone())?.into_json()
            }
            Self::Normalize { method } => pipeline.normalize(dataset_id, *method)?.into_json(),
            Self::DetectOutliers { threshold } => {
                pipeline.detect_outliers(dataset_id, *threshold)?.into_json()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    #[test]
    fn test_cleaning_op_kinds() {
        assert_eq!(CleaningOp::RemoveDuplicates.kind(), OperationKind::Dedup);
        assert_eq!(
            CleaningOp::DetectOutliers { threshold: None }.kind(),
            OperationKind::DetectOutliers
        );
    }

    #[test]
    fn test_cleaning_op_from_json() {
        let op: CleaningOp =
            serde_json::from_str(r#"{"operation":"fill_missing","strategy":{"constant":0}}"#)
                .unwrap();
        assert_eq!(
            op,
            CleaningOp::FillMissing {
                strategy: FillStrategy::Constant(Value::from(0.0))
            }
        );

        let op: CleaningOp =
            serde_json::from_str(r#"{"operation":"normalize","method":"z_score"}"#).unwrap();
        assert_eq!(
            op,
            CleaningOp::Normalize {
                method: NormalizeMethod::ZScore
            }
        );
    }

    #[test]
    fn test_transform_constructors() {
        let t = Transform::unchanged(1);
        assert!(!t.is_rewrite());
        let t = Transform::rewrite(vec![], 2);
        assert!(t.is_rewrite());
    }
}
