//! The cleaning pipeline and its builder.

use std::sync::Arc;

use crate::config::CleaningConfig;
use crate::error::{CleaningError, Result};
use crate::pipeline::executor::OperationOutcome;
use crate::pipeline::{
    DedupSummary, FillStrategy, FillSummary, NormalizeMethod, NormalizeSummary, OutlierReport,
    dedup, imputation, normalize, outliers,
};
use crate::store::DatasetStore;
use crate::tracker::ProgressTracker;
use crate::types::{DatasetId, OperationKind};

/// Runs cleaning operations against a shared store and tracker.
///
/// Use [`Pipeline::builder()`] to create a pipeline. Pipelines are cheap to
/// clone; clones share the same store and tracker.
///
/// # Example
///
/// ```rust,ignore
/// use scrub_processing::{FillStrategy, Pipeline};
///
/// let pipeline = Pipeline::builder().build()?;
/// let id = pipeline.store().create(columns, rows)?;
///
/// let dedup = pipeline.remove_duplicates(&id)?;
/// println!("removed {}", dedup.summary.duplicates_removed);
///
/// pipeline.fill_missing(&id, FillStrategy::Median)?;
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) store: Arc<DatasetStore>,
    pub(crate) tracker: Arc<ProgressTracker>,
    pub(crate) config: CleaningConfig,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Remove exact duplicate rows, keeping first occurrences.
    pub fn remove_duplicates(&self, dataset_id: &DatasetId) -> Result<OperationOutcome<DedupSummary>> {
        self.execute(dataset_id, OperationKind::Dedup, |ds, reporter| {
            dedup::remove_duplicates(ds, &self.config, reporter)
        })
    }

    /// Fill missing cells with the given strategy.
    pub fn fill_missing(
        &self,
        dataset_id: &DatasetId,
        strategy: FillStrategy,
    ) -> Result<OperationOutcome<FillSummary>> {
        self.execute(dataset_id, OperationKind::FillMissing, |ds, reporter| {
            imputation::fill_missing(ds, &strategy, &self.config, reporter)
        })
    }

    /// Rescale numeric columns.
    pub fn normalize(
        &self,
        dataset_id: &DatasetId,
        method: NormalizeMethod,
    ) -> Result<OperationOutcome<NormalizeSummary>> {
        self.execute(dataset_id, OperationKind::Normalize, |ds, reporter| {
            normalize::normalize(ds, method, &self.config, reporter)
        })
    }

    /// Flag outliers without modifying the dataset.
    ///
    /// An invalid threshold is rejected before any operation is recorded.
    pub fn detect_outliers(
        &self,
        dataset_id: &DatasetId,
        threshold: Option<f64>,
    ) -> Result<OperationOutcome<OutlierReport>> {
        if let Some(t) = threshold {
            outliers::validate_threshold(t)?;
        }
        self.execute(dataset_id, OperationKind::DetectOutliers, |ds, reporter| {
            outliers::detect_outliers(ds, threshold, &self.config, reporter)
        })
    }
}

/// Builder for [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    store: Option<Arc<DatasetStore>>,
    tracker: Option<Arc<ProgressTracker>>,
    config: Option<CleaningConfig>,
}

impl PipelineBuilder {
    /// Share an existing store (e.g. with an import coordinator).
    pub fn store(mut self, store: Arc<DatasetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing tracker.
    pub fn tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| CleaningError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            store: self.store.unwrap_or_default(),
            tracker: self.tracker.unwrap_or_default(),
            config,
        })
    }
}
