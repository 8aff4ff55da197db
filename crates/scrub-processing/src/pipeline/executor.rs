//! Operation bracket: begin, snapshot, transform, write back, complete.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{CleaningError, Result};
use crate::pipeline::Transform;
use crate::pipeline::builder::Pipeline;
use crate::pipeline::progress::{ProgressReporter, ProgressUpdate};
use crate::tracker::TrackerReporter;
use crate::types::{DatasetId, OperationId, OperationKind};

/// Result of one tracked operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome<S> {
    pub operation_id: OperationId,
    pub dataset_id: DatasetId,
    pub kind: OperationKind,
    /// Dataset version after the operation.
    pub version: u64,
    /// Whether the dataset content was rewritten.
    pub rewritten: bool,
    pub summary: S,
}

impl<S: Serialize> OperationOutcome<S> {
    /// Erase the typed summary into JSON.
    pub fn into_json(self) -> Result<OperationOutcome<serde_json::Value>> {
        Ok(OperationOutcome {
            summary: serde_json::to_value(&self.summary)?,
            operation_id: self.operation_id,
            dataset_id: self.dataset_id,
            kind: self.kind,
            version: self.version,
            rewritten: self.rewritten,
        })
    }
}

impl Pipeline {
    /// Run `transform` as a tracked operation of `kind` on `dataset_id`.
    ///
    /// Any error after `begin` marks the record failed; dataset content is
    /// left exactly as the store holds it.
    pub(crate) fn execute<S, F>(
        &self,
        dataset_id: &DatasetId,
        kind: OperationKind,
        transform: F,
    ) -> Result<OperationOutcome<S>>
    where
        S: Serialize,
        F: FnOnce(&Dataset, &dyn ProgressReporter) -> Result<Transform<S>>,
    {
        if !self.store.contains(dataset_id) {
            return Err(CleaningError::DatasetNotFound(dataset_id.clone()));
        }

        let operation_id = self.tracker.begin(dataset_id, kind)?;
        let started = Instant::now();
        info!("{} started on dataset {}", kind.display_name(), dataset_id);

        let reporter = TrackerReporter::new(&self.tracker, &operation_id);
        reporter.report(ProgressUpdate::new(
            kind,
            0.0,
            format!("{}: starting", kind.display_name()),
        ));

        match self.apply(dataset_id, &reporter, transform) {
            Ok((version, rewritten, summary, summary_json)) => {
                self.tracker.complete(&operation_id, summary_json)?;
                info!(
                    "{} completed on dataset {} in {:?} (version {})",
                    kind.display_name(),
                    dataset_id,
                    started.elapsed(),
                    version
                );
                Ok(OperationOutcome {
                    operation_id,
                    dataset_id: dataset_id.clone(),
                    kind,
                    version,
                    rewritten,
                    summary,
                })
            }
            Err(e) => {
                if let Err(track_err) = self.tracker.fail(&operation_id, &e) {
                    debug!("Could not record failure of {}: {}", operation_id, track_err);
                }
                Err(e)
            }
        }
    }

    fn apply<S, F>(
        &self,
        dataset_id: &DatasetId,
        reporter: &dyn ProgressReporter,
        transform: F,
    ) -> Result<(u64, bool, S, serde_json::Value)>
    where
        S: Serialize,
        F: FnOnce(&Dataset, &dyn ProgressReporter) -> Result<Transform<S>>,
    {
        let snapshot = self.store.get(dataset_id)?;
        let Transform { rows, summary } = transform(&snapshot, reporter)?;
        let summary_json = serde_json::to_value(&summary)?;

        let (version, rewritten) = match rows {
            Some(rows) => (self.store.replace(dataset_id, rows, snapshot.version)?, true),
            None => (snapshot.version, false),
        };
        Ok((version, rewritten, summary, summary_json))
    }
}
