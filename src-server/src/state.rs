//! Application State
//!
//! Everything the handlers share lives here. The dataset store and the
//! progress tracker are owned by the [`Pipeline`]; the import coordinator
//! holds clones of the same `Arc`s so uploads and cleaning operations see
//! one set of datasets.
//!
//! ```text
//! ┌──────────────────────────────── AppState ───────────────────────────────┐
//! │  pipeline: Pipeline ──────────┬── store:   Arc<DatasetStore>            │
//! │                               └── tracker: Arc<ProgressTracker>         │
//! │  importer: Arc<ImportCoordinator> (same store + tracker, job table)     │
//! │  connected_at: RwLock<Option<DateTime<Utc>>>                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `AppState` is cheap to clone; axum hands each handler its own copy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use scrub_processing::{CleaningConfig, CleaningResult, ImportCoordinator, Pipeline};

#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub importer: Arc<ImportCoordinator>,
    /// Wall-clock budget for a single cleaning operation.
    pub operation_timeout: Duration,
    /// Set by `/api/database/connect`.
    connected_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(config: CleaningConfig, operation_timeout: Duration) -> CleaningResult<Self> {
        let pipeline = Pipeline::builder().config(config.clone()).build()?;
        let importer = Arc::new(ImportCoordinator::new(
            pipeline.store().clone(),
            pipeline.tracker().clone(),
            config,
        ));
        Ok(Self {
            pipeline,
            importer,
            operation_timeout,
            connected_at: Arc::new(RwLock::new(None)),
        })
    }

    /// Mark the store as connected and return when that first happened.
    pub fn connect(&self) -> DateTime<Utc> {
        *self.connected_at.write().get_or_insert_with(Utc::now)
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        *self.connected_at.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importer_shares_pipeline_store() {
        let state = AppState::new(CleaningConfig::default(), Duration::from_secs(1)).unwrap();
        let summary = state.importer.import_file("a.csv", b"x\n1\n2\n").unwrap();
        assert!(state.pipeline.store().contains(&summary.dataset_id));
    }

    #[test]
    fn test_connect_is_sticky() {
        let state = AppState::new(CleaningConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(state.connected_at().is_none());
        let first = state.connect();
        let second = state.clone().connect();
        assert_eq!(first, second);
        assert_eq!(state.connected_at(), Some(first));
    }
}
