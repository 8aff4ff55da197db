//! Outlier detection for numeric columns.
//!
//! Detection is read-only: it reports flagged row indices per column and
//! never rewrites the dataset.
//!
//! A value is scored against the *other* values of its column (leave-one-out):
//! its distance from their mean is compared with `threshold` times their
//! population standard deviation. Scoring against statistics that include the
//! value itself caps the attainable z-score at `(n - 1) / sqrt(n)`, so in small
//! columns a single extreme value could never cross a 3σ threshold.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::config::CleaningConfig;
use crate::dataset::{Dataset, Value};
use crate::error::{CleaningError, Result};
use crate::pipeline::Transform;
use crate::pipeline::progress::{ProgressReporter, RowTicker};
use crate::types::OperationKind;

/// Flagged row indices keyed by column, in dataset column order.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnOutliers(Vec<(String, Vec<usize>)>);

impl ColumnOutliers {
    pub fn get(&self, column: &str) -> Option<&Vec<usize>> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, rows)| rows)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Register `column` with no flagged rows. Existing entries are kept.
    fn add_column(&mut self, column: &str) -> usize {
        match self.0.iter().position(|(c, _)| c == column) {
            Some(pos) => pos,
            None => {
                self.0.push((column.to_string(), Vec::new()));
                self.0.len() - 1
            }
        }
    }

    fn flag(&mut self, slot: usize, row: usize) {
        self.0[slot].1.push(row);
    }
}

impl Serialize for ColumnOutliers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, rows) in &self.0 {
            map.serialize_entry(column, rows)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnOutliers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ColumnOutliers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to row indices")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<ColumnOutliers, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, rows)) = access.next_entry::<String, Vec<usize>>()? {
                    entries.push((column, rows));
                }
                Ok(ColumnOutliers(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub threshold: f64,
    /// Flagged row indices per numeric column, ascending.
    pub outliers_detected: ColumnOutliers,
    pub total_outliers: usize,
    /// Numeric columns with too few values to score.
    pub skipped_columns: Vec<String>,
}

/// Running moments of one column, enough to score every value in O(1).
#[derive(Debug, Clone, Copy)]
struct ColumnMoments {
    idx: usize,
    /// Position of the column's entry in the report.
    slot: usize,
    n: f64,
    mean: f64,
    /// Sum of squared deviations from `mean`.
    m2: f64,
    /// Absolute tolerance below which a deviation counts as zero.
    tolerance: f64,
}

impl ColumnMoments {
    fn new(idx: usize, slot: usize, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let m2 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let scale = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        Self {
            idx,
            slot,
            n,
            mean,
            m2,
            tolerance: 1e-12 * (1.0 + scale),
        }
    }

    /// Whether `x` lies more than `threshold` deviations from the other values.
    fn is_outlier(&self, x: f64, threshold: f64) -> bool {
        let d = x - self.mean;
        let ratio = self.n / (self.n - 1.0);
        let distance = (d * ratio).abs();
        let others_m2 = (self.m2 - d * d * ratio).max(0.0);
        let others_std = (others_m2 / (self.n - 1.0)).sqrt();

        if others_std <= self.tolerance {
            distance > self.tolerance
        } else {
            distance > threshold * others_std
        }
    }
}

/// Check a caller-supplied threshold.
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(CleaningError::InvalidConfig(format!(
            "outlier threshold must be a positive number, got {}",
            threshold
        )));
    }
    Ok(threshold)
}

/// Flag values more than `threshold` standard deviations from the rest of
/// their column. `None` uses the configured default.
pub fn detect_outliers(
    dataset: &Dataset,
    threshold: Option<f64>,
    config: &CleaningConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Transform<OutlierReport>> {
    let threshold = validate_threshold(threshold.unwrap_or(config.outlier_threshold))?;

    let mut report = OutlierReport {
        threshold,
        outliers_detected: ColumnOutliers::default(),
        total_outliers: 0,
        skipped_columns: Vec::new(),
    };

    let mut scored: Vec<ColumnMoments> = Vec::new();
    for idx in dataset.numeric_columns() {
        let values: Vec<f64> = dataset
            .numeric_values(idx)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        let column = dataset.columns[idx].clone();
        let slot = report.outliers_detected.add_column(&column);
        if values.len() < config.min_outlier_values.max(2) {
            debug!(
                "Not scoring column '{}': {} values, need {}",
                column,
                values.len(),
                config.min_outlier_values
            );
            report.skipped_columns.push(column.clone());
        } else {
            scored.push(ColumnMoments::new(idx, slot, &values));
        }
    }

    let total = dataset.row_count();
    let ticker = RowTicker::new(
        reporter,
        OperationKind::DetectOutliers,
        config.progress_interval,
        total,
    );
    for (row_idx, row) in dataset.rows.iter().enumerate() {
        for moments in &scored {
            if let Value::Number(x) = row[moments.idx]
                && x.is_finite()
                && moments.is_outlier(x, threshold)
            {
                report.outliers_detected.flag(moments.slot, row_idx);
                report.total_outliers += 1;
            }
        }
        ticker.tick(row_idx + 1);
    }
    ticker.finish();

    debug!(
        "Dataset {}: {} outliers across {} scored columns",
        dataset.id,
        report.total_outliers,
        scored.len()
    );
    Ok(Transform::unchanged(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::NoopReporter;
    use crate::types::DatasetId;
    use pretty_assertions::assert_eq;

    fn dataset(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::new(
            DatasetId::from("ds"),
            None,
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        )
        .unwrap()
    }

    fn single(values: &[f64]) -> Dataset {
        dataset(
            &["d"],
            values.iter().map(|v| vec![Value::from(*v)]).collect(),
        )
    }

    #[test]
    fn test_flags_single_extreme_value() {
        let ds = single(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let t = detect_outliers(&ds, Some(3.0), &CleaningConfig::default(), &NoopReporter).unwrap();

        assert!(!t.is_rewrite());
        assert_eq!(t.summary.outliers_detected.get("d").unwrap(), &vec![4]);
        assert_eq!(t.summary.total_outliers, 1);
    }

    #[test]
    fn test_uniform_spread_has_no_outliers() {
        let ds = single(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let t = detect_outliers(&ds, None, &CleaningConfig::default(), &NoopReporter).unwrap();
        assert!(t.summary.outliers_detected.get("d").unwrap().is_empty());
    }

    #[test]
    fn test_constant_rest_flags_any_difference() {
        let ds = single(&[5.0, 5.0, 5.0, 5.0, 6.0]);
        let t = detect_outliers(&ds, None, &CleaningConfig::default(), &NoopReporter).unwrap();
        assert_eq!(t.summary.outliers_detected.get("d").unwrap(), &vec![4]);

        let ds = single(&[5.0, 5.0, 5.0]);
        let t = detect_outliers(&ds, None, &CleaningConfig::default(), &NoopReporter).unwrap();
        assert!(t.summary.outliers_detected.get("d").unwrap().is_empty());
    }

    #[test]
    fn test_small_columns_are_skipped() {
        let ds = dataset(
            &["few", "text"],
            vec![
                vec![Value::from(1.0), Value::from("a")],
                vec![Value::from(1000.0), Value::from("b")],
            ],
        );
        let t = detect_outliers(&ds, None, &CleaningConfig::default(), &NoopReporter).unwrap();

        assert_eq!(t.summary.skipped_columns, vec!["few".to_string()]);
        assert!(t.summary.outliers_detected.get("few").unwrap().is_empty());
        assert!(!t.summary.outliers_detected.contains_key("text"));
    }

    #[test]
    fn test_missing_cells_are_ignored() {
        let ds = dataset(
            &["d"],
            vec![
                vec![Value::from(1.0)],
                vec![Value::Missing],
                vec![Value::from(2.0)],
                vec![Value::from(3.0)],
                vec![Value::from(2.0)],
                vec![Value::from(500.0)],
            ],
        );
        let t = detect_outliers(&ds, None, &CleaningConfig::default(), &NoopReporter).unwrap();
        assert_eq!(t.summary.outliers_detected.get("d").unwrap(), &vec![5]);
    }

    #[test]
    fn test_report_keeps_column_order() {
        let ds = dataset(
            &["zeta", "alpha", "mid"],
            (0..5)
                .map(|i| {
                    let x = if i == 4 { 100.0 } else { i as f64 };
                    vec![Value::from(x), Value::from(x), Value::from(x)]
                })
                .collect(),
        );
        let t = detect_outliers(&ds, Some(3.0), &CleaningConfig::default(), &NoopReporter).unwrap();

        assert_eq!(
            serde_json::to_string(&t.summary.outliers_detected).unwrap(),
            r#"{"zeta":[4],"alpha":[4],"mid":[4]}"#
        );
        let back: OutlierReport =
            serde_json::from_value(serde_json::to_value(&t.summary).unwrap()).unwrap();
        assert_eq!(back, t.summary);
    }

    #[test]
    fn test_non_finite_values_are_not_scored() {
        let ds = single(&[1.0, 2.0, 3.0, 4.0, f64::NEG_INFINITY, f64::NAN]);
        assert!(ds.rows[4][0].is_missing());

        let t = detect_outliers(&ds, Some(3.0), &CleaningConfig::default(), &NoopReporter).unwrap();
        assert!(t.summary.outliers_detected.get("d").unwrap().is_empty());
        assert_eq!(t.summary.total_outliers, 0);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let ds = single(&[1.0, 2.0, 3.0]);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                detect_outliers(&ds, Some(bad), &CleaningConfig::default(), &NoopReporter),
                Err(CleaningError::InvalidConfig(_))
            ));
        }
    }
}
