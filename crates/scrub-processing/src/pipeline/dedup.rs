//! Exact duplicate row removal.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::CleaningConfig;
use crate::dataset::{Dataset, Row};
use crate::error::Result;
use crate::pipeline::Transform;
use crate::pipeline::progress::{ProgressReporter, RowTicker};
use crate::types::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupSummary {
    pub duplicates_removed: usize,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Drop every row equal in all columns to an earlier row.
///
/// Missing cells compare equal to each other, so two rows that are both
/// missing `b` and agree elsewhere are duplicates. The first occurrence is
/// kept and row order is otherwise preserved.
pub fn remove_duplicates(
    dataset: &Dataset,
    config: &CleaningConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Transform<DedupSummary>> {
    let total = dataset.row_count();
    let ticker = RowTicker::new(reporter, OperationKind::Dedup, config.progress_interval, total);

    let mut seen: HashSet<&Row> = HashSet::with_capacity(total);
    let mut kept: Vec<&Row> = Vec::with_capacity(total);
    for (i, row) in dataset.rows.iter().enumerate() {
        if seen.insert(row) {
            kept.push(row);
        }
        ticker.tick(i + 1);
    }
    ticker.finish();

    let summary = DedupSummary {
        duplicates_removed: total - kept.len(),
        rows_before: total,
        rows_after: kept.len(),
    };
    debug!(
        "Dataset {}: {} duplicate rows found",
        dataset.id, summary.duplicates_removed
    );

    if summary.duplicates_removed == 0 {
        return Ok(Transform::unchanged(summary));
    }
    Ok(Transform::rewrite(
        kept.into_iter().cloned().collect(),
        summary,
    ))
}
