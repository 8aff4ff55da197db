//! Missing value imputation.
//!
//! Provides mean, median, mode and constant fill strategies. `mean` and
//! `median` only touch numeric columns; `mode` and `constant` apply to any
//! column.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CleaningConfig;
use crate::dataset::{ColumnKind, Dataset, Value};
use crate::error::{CleaningError, Result};
use crate::pipeline::Transform;
use crate::pipeline::progress::{ProgressReporter, RowTicker};
use crate::types::OperationKind;
use crate::utils;

/// How missing cells are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    Mean,
    Median,
    Mode,
    Constant(Value),
}

impl FillStrategy {
    /// Parse a strategy name as sent by clients. `constant` requires `value`.
    pub fn parse(name: &str, value: Option<Value>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            "constant" => match value {
                Some(v) if !v.is_missing() => Ok(Self::Constant(v)),
                _ => Err(CleaningError::InvalidStrategy(
                    "constant strategy requires a value".to_string(),
                )),
            },
            other => Err(CleaningError::InvalidStrategy(format!(
                "unknown strategy '{}', expected one of mean, median, mode, constant",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Constant(_) => "constant",
        }
    }
}

/// Per-column outcome of a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFill {
    pub column: String,
    pub filled: usize,
    /// Value written into the missing cells.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Why the column was left alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillSummary {
    pub strategy: String,
    pub columns: Vec<ColumnFill>,
    pub cells_filled: usize,
}

impl FillSummary {
    /// One-line description for API responses.
    pub fn message(&self) -> String {
        let touched = self.columns.iter().filter(|c| c.filled > 0).count();
        format!(
            "Filled {} missing values in {} columns using {}.",
            self.cells_filled, touched, self.strategy
        )
    }
}

/// Pick the fill value for one column, or the reason it is skipped.
fn fill_value(
    dataset: &Dataset,
    idx: usize,
    strategy: &FillStrategy,
) -> std::result::Result<Value, &'static str> {
    let kind = dataset.column_kind(idx);
    match strategy {
        FillStrategy::Constant(v) => Ok(v.clone()),
        _ if kind == ColumnKind::Empty => Err("no non-missing values"),
        FillStrategy::Mode => utils::mode(dataset.column_values(idx).filter(|v| !v.is_missing()))
            .cloned()
            .ok_or("no non-missing values"),
        FillStrategy::Mean | FillStrategy::Median => {
            if kind != ColumnKind::Numeric {
                return Err("not numeric");
            }
            let values: Vec<f64> = dataset
                .numeric_values(idx)
                .into_iter()
                .map(|(_, v)| v)
                .collect();
            let stat = if *strategy == FillStrategy::Mean {
                utils::mean(&values)
            } else {
                utils::median(&values)
            };
            stat.map(Value::Number).ok_or("no non-missing values")
        }
    }
}

/// Replace missing cells according to `strategy`.
///
/// Zero cells filled leaves the dataset unchanged, so a second run with the
/// same strategy is a no-op.
pub fn fill_missing(
    dataset: &Dataset,
    strategy: &FillStrategy,
    config: &CleaningConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Transform<FillSummary>> {
    let plan: Vec<std::result::Result<Value, &'static str>> = (0..dataset.column_count())
        .map(|idx| fill_value(dataset, idx, strategy))
        .collect();

    let mut filled = vec![0usize; dataset.column_count()];
    let total = dataset.row_count();
    let ticker = RowTicker::new(
        reporter,
        OperationKind::FillMissing,
        config.progress_interval,
        total,
    );

    let mut rows = dataset.rows.clone();
    for (i, row) in rows.iter_mut().enumerate() {
        for (idx, cell) in row.iter_mut().enumerate() {
            if let (true, Ok(value)) = (cell.is_missing(), &plan[idx]) {
                *cell = value.clone();
                filled[idx] += 1;
            }
        }
        ticker.tick(i + 1);
    }
    ticker.finish();

    let columns: Vec<ColumnFill> = dataset
        .columns
        .iter()
        .zip(plan)
        .zip(&filled)
        .map(|((column, planned), &count)| match planned {
            Ok(value) => ColumnFill {
                column: column.clone(),
                filled: count,
                value: Some(value),
                skipped: None,
            },
            Err(reason) => {
                debug!("Skipping column '{}' for {}: {}", column, strategy.name(), reason);
                ColumnFill {
                    column: column.clone(),
                    filled: 0,
                    value: None,
                    skipped: Some(reason.to_string()),
                }
            }
        })
        .collect();

    let summary = FillSummary {
        strategy: strategy.name().to_string(),
        cells_filled: filled.iter().sum(),
        columns,
    };

    if summary.cells_filled == 0 {
        return Ok(Transform::unchanged(summary));
    }
    Ok(Transform::rewrite(rows, summary))
}
