//! Numeric column rescaling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::config::CleaningConfig;
use crate::dataset::{Dataset, Value};
use crate::error::{CleaningError, Result};
use crate::pipeline::Transform;
use crate::pipeline::progress::{ProgressReporter, RowTicker};
use crate::types::OperationKind;
use crate::utils;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    /// Rescale to the configured target range.
    #[default]
    MinMax,
    /// Center on the mean and divide by the sample standard deviation.
    ZScore,
}

impl NormalizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinMax => "min_max",
            Self::ZScore => "z_score",
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "min_max" | "minmax" => Ok(Self::MinMax),
            "z_score" | "zscore" => Ok(Self::ZScore),
            other => Err(CleaningError::InvalidConfig(format!(
                "unknown normalization method '{}', expected min_max or z_score",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub column: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeSummary {
    pub method: NormalizeMethod,
    pub normalized_columns: Vec<String>,
    pub skipped_columns: Vec<SkippedColumn>,
}

/// Affine map `x -> (x - offset) / spread * width + base` for one column.
#[derive(Debug, Clone, Copy)]
struct Rescale {
    offset: f64,
    spread: f64,
    width: f64,
    base: f64,
    /// Input that must land exactly on `upper`.
    pin: Option<(f64, f64)>,
}

impl Rescale {
    fn apply(&self, x: f64) -> f64 {
        match self.pin {
            Some((at, upper)) if x == at => upper,
            _ => (x - self.offset) / self.spread * self.width + self.base,
        }
    }
}

fn plan_column(
    values: &[f64],
    method: NormalizeMethod,
    config: &CleaningConfig,
) -> std::result::Result<Rescale, &'static str> {
    match method {
        NormalizeMethod::MinMax => {
            let (min, max) = utils::min_max(values).ok_or("no values")?;
            if min == max {
                return Err("constant column");
            }
            let (lo, hi) = (config.normalize_min, config.normalize_max);
            Ok(Rescale {
                offset: min,
                spread: max - min,
                width: hi - lo,
                base: lo,
                pin: Some((max, hi)),
            })
        }
        NormalizeMethod::ZScore => {
            let mean = utils::mean(values).ok_or("no values")?;
            let std = utils::sample_std(values).ok_or("fewer than two values")?;
            if !(std.is_finite() && std > 0.0) {
                return Err("zero standard deviation");
            }
            Ok(Rescale {
                offset: mean,
                spread: std,
                width: 1.0,
                base: 0.0,
                pin: None,
            })
        }
    }
}

/// Rescale every numeric column. Missing cells stay missing.
pub fn normalize(
    dataset: &Dataset,
    method: NormalizeMethod,
    config: &CleaningConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Transform<NormalizeSummary>> {
    let mut plans: Vec<(usize, Rescale)> = Vec::new();
    let mut summary = NormalizeSummary {
        method,
        normalized_columns: Vec::new(),
        skipped_columns: Vec::new(),
    };

    for idx in dataset.numeric_columns() {
        let values: Vec<f64> = dataset
            .numeric_values(idx)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        let column = &dataset.columns[idx];
        match plan_column(&values, method, config) {
            Ok(rescale) => {
                plans.push((idx, rescale));
                summary.normalized_columns.push(column.clone());
            }
            Err(reason) => {
                debug!("Not normalizing column '{}': {}", column, reason);
                summary.skipped_columns.push(SkippedColumn {
                    column: column.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    let total = dataset.row_count();
    let ticker = RowTicker::new(reporter, OperationKind::Normalize, config.progress_interval, total);
    let mut rows = dataset.rows.clone();
    let mut changed = false;
    for (i, row) in rows.iter_mut().enumerate() {
        for (idx, rescale) in &plans {
            if let Value::Number(x) = row[*idx]
                && x.is_finite()
            {
                let scaled = rescale.apply(x);
                changed |= scaled != x;
                row[*idx] = Value::Number(scaled);
            }
        }
        ticker.tick(i + 1);
    }
    ticker.finish();

    if !changed {
        return Ok(Transform::unchanged(summary));
    }
    Ok(Transform::rewrite(rows, summary))
}
