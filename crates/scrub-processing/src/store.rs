//! In-memory dataset store with optimistic versioning.
//!
//! The store exclusively owns dataset content. Readers get owned snapshots;
//! writers must present the version they read, and a stale write fails with
//! [`CleaningError::VersionConflict`] instead of overwriting newer content.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::dataset::{Dataset, Row};
use crate::error::{CleaningError, Result};
use crate::types::DatasetId;

/// Listing entry for an imported dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub id: DatasetId,
    pub name: Option<String>,
    pub row_count: usize,
    pub column_count: usize,
    pub version: u64,
    pub imported_at: DateTime<Utc>,
}

impl From<&Dataset> for DatasetInfo {
    fn from(ds: &Dataset) -> Self {
        Self {
            id: ds.id.clone(),
            name: ds.name.clone(),
            row_count: ds.row_count(),
            column_count: ds.column_count(),
            version: ds.version,
            imported_at: ds.imported_at,
        }
    }
}

/// Thread-safe map from dataset id to content.
#[derive(Debug, Default)]
pub struct DatasetStore {
    datasets: RwLock<HashMap<DatasetId, Dataset>>,
}

static_assertions::assert_impl_all!(DatasetStore: Send, Sync);

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new unnamed dataset at version 0.
    pub fn create(&self, columns: Vec<String>, rows: Vec<Row>) -> Result<DatasetId> {
        self.create_named(None, columns, rows)
    }

    /// Store a new dataset at version 0, remembering its source name.
    pub fn create_named(
        &self,
        name: Option<String>,
        columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<DatasetId> {
        let id = DatasetId::new();
        let dataset = Dataset::new(id.clone(), name, columns, rows)?;
        debug!(
            "Created dataset {} ({} rows x {} columns)",
            id,
            dataset.row_count(),
            dataset.column_count()
        );
        self.datasets.write().insert(id.clone(), dataset);
        Ok(id)
    }

    /// Snapshot of a dataset.
    pub fn get(&self, id: &DatasetId) -> Result<Dataset> {
        self.datasets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CleaningError::DatasetNotFound(id.clone()))
    }

    /// Current version of a dataset.
    pub fn version(&self, id: &DatasetId) -> Result<u64> {
        self.datasets
            .read()
            .get(id)
            .map(|ds| ds.version)
            .ok_or_else(|| CleaningError::DatasetNotFound(id.clone()))
    }

    /// Swap the rows if `expected_version` is current; returns the new version.
    pub fn replace(&self, id: &DatasetId, new_rows: Vec<Row>, expected_version: u64) -> Result<u64> {
        let mut datasets = self.datasets.write();
        let dataset = datasets
            .get_mut(id)
            .ok_or_else(|| CleaningError::DatasetNotFound(id.clone()))?;

        Self::check_version(dataset, expected_version)?;
        Dataset::validate_rows(dataset.columns.len(), &new_rows)?;

        dataset.rows = new_rows;
        dataset.version += 1;
        debug!("Dataset {} now at version {}", id, dataset.version);
        Ok(dataset.version)
    }

    fn check_version(dataset: &Dataset, expected: u64) -> Result<()> {
        if dataset.version != expected {
            return Err(CleaningError::VersionConflict {
                dataset_id: dataset.id.clone(),
                expected,
                actual: dataset.version,
            });
        }
        Ok(())
    }

    /// All datasets, oldest import first.
    pub fn list(&self) -> Vec<DatasetInfo> {
        let mut infos: Vec<DatasetInfo> = self.datasets.read().values().map(Into::into).collect();
        infos.sort_by(|a, b| {
            a.imported_at
                .cmp(&b.imported_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        infos
    }

    pub fn contains(&self, id: &DatasetId) -> bool {
        self.datasets.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.datasets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.read().is_empty()
    }

    /// Total row count across every dataset.
    pub fn total_rows(&self) -> usize {
        self.datasets.read().values().map(Dataset::row_count).sum()
    }

    /// Drop a dataset, returning its last snapshot.
    pub fn remove(&self, id: &DatasetId) -> Result<Dataset> {
        self.datasets
            .write()
            .remove(id)
            .ok_or_else(|| CleaningError::DatasetNotFound(id.clone()))
    }
}
