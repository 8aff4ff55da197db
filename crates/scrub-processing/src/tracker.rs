//! Per-dataset operation log and the at-most-one-running rule.
//!
//! Every import and cleaning action gets an [`OperationRecord`]. A dataset may
//! have any number of finished records but at most one `running` record;
//! [`ProgressTracker::begin`] enforces this inside a single write-locked
//! section, which is what serializes mutating work per dataset.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CleaningError, Result};
use crate::pipeline::progress::{ProgressReporter, ProgressUpdate};
use crate::types::{DatasetId, OperationId, OperationKind, OperationRecord, OperationStatus};

#[derive(Debug, Default)]
struct TrackerState {
    records: HashMap<OperationId, OperationRecord>,
    /// Operation ids per dataset, in start order.
    history: HashMap<DatasetId, Vec<OperationId>>,
    running: HashMap<DatasetId, OperationId>,
}

impl TrackerState {
    fn record_mut(&mut self, id: &OperationId) -> Result<&mut OperationRecord> {
        self.records
            .get_mut(id)
            .ok_or_else(|| CleaningError::OperationNotFound(id.clone()))
    }

    /// Move a running record to a terminal status.
    fn finish(
        &mut self,
        id: &OperationId,
        status: OperationStatus,
        summary: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let record = self.record_mut(id)?;
        if record.status.is_terminal() {
            return Err(CleaningError::OperationFinished(id.clone()));
        }

        record.status = status;
        record.result_summary = Some(summary);
        record.finished_at = Some(now);
        if status == OperationStatus::Completed {
            record.progress = 1.0;
        }

        let dataset_id = record.dataset_id.clone();
        if self.running.get(&dataset_id) == Some(id) {
            self.running.remove(&dataset_id);
        }
        Ok(())
    }
}

/// Thread-safe operation tracker.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: RwLock<TrackerState>,
}

static_assertions::assert_impl_all!(ProgressTracker: Send, Sync);

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an operation on a dataset.
    ///
    /// Fails with [`CleaningError::Conflict`] when another operation is
    /// already running on the same dataset.
    pub fn begin(&self, dataset_id: &DatasetId, kind: OperationKind) -> Result<OperationId> {
        let mut state = self.state.write();

        if let Some(running_id) = state.running.get(dataset_id) {
            let running = state
                .records
                .get(running_id)
                .map(|r| r.operation_kind)
                .unwrap_or(kind);
            return Err(CleaningError::Conflict {
                dataset_id: dataset_id.clone(),
                running,
            });
        }

        let id = OperationId::new();
        let mut record = OperationRecord {
            id: id.clone(),
            dataset_id: dataset_id.clone(),
            operation_kind: kind,
            status: OperationStatus::Pending,
            progress: 0.0,
            items_processed: None,
            items_total: None,
            result_summary: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        record.status = OperationStatus::Running;

        state.records.insert(id.clone(), record);
        state
            .history
            .entry(dataset_id.clone())
            .or_default()
            .push(id.clone());
        state.running.insert(dataset_id.clone(), id.clone());

        debug!("Operation {} ({}) started on dataset {}", id, kind, dataset_id);
        Ok(id)
    }

    /// Record progress for a running operation. Updates to finished records are dropped.
    pub fn report(&self, id: &OperationId, update: &ProgressUpdate) -> Result<()> {
        let mut state = self.state.write();
        let record = state.record_mut(id)?;
        if record.status != OperationStatus::Running {
            return Ok(());
        }
        record.progress = update.fraction.clamp(0.0, 1.0);
        if update.items_processed.is_some() {
            record.items_processed = update.items_processed;
        }
        if update.items_total.is_some() {
            record.items_total = update.items_total;
        }
        Ok(())
    }

    /// Mark an operation completed with its result payload.
    pub fn complete(&self, id: &OperationId, summary: serde_json::Value) -> Result<()> {
        self.state
            .write()
            .finish(id, OperationStatus::Completed, summary, Utc::now())?;
        debug!("Operation {} completed", id);
        Ok(())
    }

    /// Mark an operation failed. The error becomes the record's summary.
    pub fn fail(&self, id: &OperationId, error: &CleaningError) -> Result<()> {
        let summary = serde_json::json!({
            "code": error.error_code(),
            "message": error.to_string(),
        });
        self.state
            .write()
            .finish(id, OperationStatus::Failed, summary, Utc::now())?;
        warn!("Operation {} failed: {}", id, error);
        Ok(())
    }

    /// Full operation history of a dataset, oldest first.
    pub fn progress(&self, dataset_id: &DatasetId) -> Vec<OperationRecord> {
        let state = self.state.read();
        state
            .history
            .get(dataset_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, id: &OperationId) -> Result<OperationRecord> {
        self.state
            .read()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| CleaningError::OperationNotFound(id.clone()))
    }

    /// The running operation of a dataset, if any.
    pub fn running(&self, dataset_id: &DatasetId) -> Option<OperationRecord> {
        let state = self.state.read();
        state
            .running
            .get(dataset_id)
            .and_then(|id| state.records.get(id))
            .cloned()
    }

    /// Number of operations running across all datasets.
    pub fn running_count(&self) -> usize {
        self.state.read().running.len()
    }

    /// Fail every running operation started more than `budget` before `now`.
    ///
    /// Returns the ids that were expired. A later `complete` or `fail` for
    /// one of them is rejected with [`CleaningError::OperationFinished`].
    pub fn expire_overdue(&self, budget: Duration, now: DateTime<Utc>) -> Vec<OperationId> {
        let limit = TimeDelta::from_std(budget).unwrap_or(TimeDelta::MAX);
        let mut state = self.state.write();

        let overdue: Vec<(OperationId, OperationKind)> = state
            .running
            .values()
            .filter_map(|id| state.records.get(id))
            .filter(|r| now.signed_duration_since(r.started_at) > limit)
            .map(|r| (r.id.clone(), r.operation_kind))
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for (id, kind) in overdue {
            let error = CleaningError::Timeout {
                kind,
                budget_secs: budget.as_secs(),
            };
            let summary = serde_json::json!({
                "code": error.error_code(),
                "message": error.to_string(),
            });
            if state
                .finish(&id, OperationStatus::Failed, summary, now)
                .is_ok()
            {
                warn!("Operation {} ({}) timed out after {}s", id, kind, budget.as_secs());
                expired.push(id);
            }
        }
        expired
    }
}

/// Routes transform progress into one tracker record.
pub struct TrackerReporter<'a> {
    tracker: &'a ProgressTracker,
    operation_id: &'a OperationId,
}

impl<'a> TrackerReporter<'a> {
    pub fn new(tracker: &'a ProgressTracker, operation_id: &'a OperationId) -> Self {
        Self {
            tracker,
            operation_id,
        }
    }
}

impl ProgressReporter for TrackerReporter<'_> {
    fn report(&self, update: ProgressUpdate) {
        if let Err(e) = self.tracker.report(self.operation_id, &update) {
            debug!("Dropping progress update: {}", e);
        }
    }
}
