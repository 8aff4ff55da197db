//! Tabular dataset model.
//!
//! A [`Dataset`] is an ordered list of column names plus rows of typed
//! [`Value`]s. Each row holds exactly one value per column, positionally
//! aligned with `columns`, so "every row has the same column set" holds by
//! construction once [`Dataset::validate_rows`] has accepted the rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CleaningError, Result};
use crate::types::DatasetId;

/// A single typed cell.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// A number cell; `NaN` and infinities become [`Value::Missing`].
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Value::Number(n)
        } else {
            Value::Missing
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Bit pattern used for hashing numbers: `-0.0` folds onto `0.0` and every
    /// NaN onto one canonical NaN, matching [`PartialEq`].
    fn number_key(n: f64) -> u64 {
        if n == 0.0 {
            0.0f64.to_bits()
        } else if n.is_nan() {
            f64::NAN.to_bits()
        } else {
            n.to_bits()
        }
    }

    /// Convert a JSON scalar into a cell. Arrays and objects are kept as text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::number).unwrap_or(Value::Missing),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Value-level equality: missing equals missing, numbers compare numerically.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => Value::number_key(*a) == Value::number_key(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Missing => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => Value::number_key(*n).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Missing => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(_) => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

/// One record, aligned with [`Dataset::columns`].
pub type Row = Vec<Value>;

/// Shape of a column's non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Every non-missing value is a number.
    Numeric,
    /// Every non-missing value is a boolean.
    Boolean,
    /// Every non-missing value is text.
    Text,
    /// Non-missing values of more than one type.
    Mixed,
    /// No non-missing values at all.
    Empty,
}

/// A versioned table under cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub id: DatasetId,
    /// Source file name, when the dataset came from an upload.
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub version: u64,
    pub imported_at: DateTime<Utc>,
}

impl Dataset {
    /// Build a version 0 dataset, rejecting rows of the wrong width.
    ///
    /// Non-finite numbers are stored as missing.
    pub fn new(
        id: DatasetId,
        name: Option<String>,
        columns: Vec<String>,
        mut rows: Vec<Row>,
    ) -> Result<Self> {
        Self::validate_rows(columns.len(), &rows)?;
        for cell in rows.iter_mut().flatten() {
            if let Value::Number(n) = *cell {
                *cell = Value::number(n);
            }
        }
        Ok(Self {
            id,
            name,
            columns,
            rows,
            version: 0,
            imported_at: Utc::now(),
        })
    }

    /// Check that every row has exactly `width` values.
    pub fn validate_rows(width: usize, rows: &[Row]) -> Result<()> {
        match rows.iter().position(|row| row.len() != width) {
            Some(row) => Err(CleaningError::ShapeMismatch {
                row,
                expected: width,
                found: rows[row].len(),
            }),
            None => Ok(()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of the first column with this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn missing_count(&self, idx: usize) -> usize {
        self.column_values(idx).filter(|v| v.is_missing()).count()
    }

    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for value in self.column_values(idx) {
            let this = match value {
                Value::Missing => continue,
                Value::Number(_) => ColumnKind::Numeric,
                Value::Bool(_) => ColumnKind::Boolean,
                Value::Text(_) => ColumnKind::Text,
            };
            kind = match kind {
                ColumnKind::Empty => this,
                k if k == this => k,
                _ => return ColumnKind::Mixed,
            };
        }
        kind
    }

    /// Indices of the numeric columns, in column order.
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&idx| self.column_kind(idx) == ColumnKind::Numeric)
            .collect()
    }

    /// Finite numbers of a column paired with their row index.
    pub fn numeric_values(&self, idx: usize) -> Vec<(usize, f64)> {
        self.column_values(idx)
            .enumerate()
            .filter_map(|(row, v)| v.as_f64().map(|n| (row, n)))
            .filter(|(_, n)| n.is_finite())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            DatasetId::from("ds"),
            None,
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                vec![Value::from(1.0), Value::from("x"), Value::Missing],
                vec![Value::from(2.0), Value::Missing, Value::from(true)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_equals_missing() {
        assert_eq!(Value::Missing, Value::Missing);
        assert_ne!(Value::Missing, Value::from(0.0));
        assert_ne!(Value::from("1"), Value::from(1.0));
    }

    #[test]
    fn test_signed_zero_and_nan_are_equal_and_hash_alike() {
        use std::collections::HashSet;

        assert_eq!(Value::from(0.0), Value::from(-0.0));
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));

        let set: HashSet<Value> = [Value::from(0.0), Value::from(-0.0), Value::from(f64::NAN)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Dataset::new(
            DatasetId::from("ds"),
            None,
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::from(1.0)]],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CleaningError::ShapeMismatch {
                row: 0,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_column_kind() {
        let ds = sample();
        assert_eq!(ds.column_kind(0), ColumnKind::Numeric);
        assert_eq!(ds.column_kind(1), ColumnKind::Text);
        assert_eq!(ds.column_kind(2), ColumnKind::Boolean);
        assert_eq!(ds.numeric_columns(), vec![0]);
    }

    #[test]
    fn test_mixed_and_empty_columns() {
        let ds = Dataset::new(
            DatasetId::from("ds"),
            None,
            vec!["m".to_string(), "e".to_string()],
            vec![
                vec![Value::from(1.0), Value::Missing],
                vec![Value::from("one"), Value::Missing],
            ],
        )
        .unwrap();

        assert_eq!(ds.column_kind(0), ColumnKind::Mixed);
        assert_eq!(ds.column_kind(1), ColumnKind::Empty);
    }

    #[test]
    fn test_non_finite_numbers_are_stored_as_missing() {
        assert_eq!(Value::number(2.5), Value::Number(2.5));
        assert_eq!(Value::number(f64::NEG_INFINITY), Value::Missing);

        let ds = Dataset::new(
            DatasetId::from("ds"),
            None,
            vec!["n".to_string()],
            vec![
                vec![Value::from(f64::INFINITY)],
                vec![Value::from(f64::NAN)],
                vec![Value::from(1.0)],
            ],
        )
        .unwrap();
        assert_eq!(
            ds.rows,
            vec![vec![Value::Missing], vec![Value::Missing], vec![Value::from(1.0)]]
        );
        assert_eq!(ds.numeric_values(0), vec![(2, 1.0)]);
    }

    #[test]
    fn test_column_lookup_and_missing_count() {
        let ds = sample();
        assert_eq!(ds.column_index("b"), Some(1));
        assert_eq!(ds.column_index("zzz"), None);
        assert_eq!(ds.missing_count(1), 1);
    }

    #[test]
    fn test_value_json_conversion() {
        let json = serde_json::json!([null, true, 2.5, "txt", {"k": 1}]);
        let values: Vec<Value> = serde_json::from_value(json).unwrap();
        assert_eq!(values[0], Value::Missing);
        assert_eq!(values[1], Value::Bool(true));
        assert_eq!(values[2], Value::Number(2.5));
        assert_eq!(values[3], Value::from("txt"));
        assert_eq!(values[4], Value::from("{\"k\":1}"));

        assert_eq!(
            serde_json::to_string(&vec![Value::Missing, Value::Number(f64::INFINITY)]).unwrap(),
            "[null,null]"
        );
    }
}
