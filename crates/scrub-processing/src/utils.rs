//! Shared helpers: statistics over plain slices and polars value conversion.

use polars::prelude::*;

use crate::dataset::Value;

// =============================================================================
// Missing Value Markers
// =============================================================================

/// Text values that mean "no value" in uploaded files.
pub const MISSING_MARKERS: [&str; 6] = ["null", "n/a", "na", "none", "missing", "#n/a"];

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Convert a polars cell into a [`Value`].
///
/// Temporal and nested values are rendered as text.
pub fn any_value_to_value(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Missing,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(i) => Value::Number(i as f64),
        AnyValue::Int16(i) => Value::Number(i as f64),
        AnyValue::Int32(i) => Value::Number(i as f64),
        AnyValue::Int64(i) => Value::Number(i as f64),
        AnyValue::UInt8(u) => Value::Number(u as f64),
        AnyValue::UInt16(u) => Value::Number(u as f64),
        AnyValue::UInt32(u) => Value::Number(u as f64),
        AnyValue::UInt64(u) => Value::Number(u as f64),
        AnyValue::Float32(f) => Value::number(f as f64),
        AnyValue::Float64(f) => Value::number(f),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        other => Value::Text(format!("{}", other)),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; the average of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Minimum and maximum, ignoring NaN.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Most frequent value; ties go to the value seen first.
pub fn mode<'a, I>(values: I) -> Option<&'a Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    let mut positions: std::collections::HashMap<&Value, usize> = std::collections::HashMap::new();

    for value in values {
        match positions.get(value) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                positions.insert(value, counts.len());
                counts.push((value, 1));
            }
        }
    }

    // max_by_key keeps the last maximum; scan manually to keep the first.
    let mut best: Option<(&Value, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_any_value_to_value() {
        assert_eq!(any_value_to_value(AnyValue::Null), Value::Missing);
        assert_eq!(any_value_to_value(AnyValue::Int64(3)), Value::Number(3.0));
        assert_eq!(any_value_to_value(AnyValue::Boolean(true)), Value::Bool(true));
        assert_eq!(any_value_to_value(AnyValue::String("x")), Value::from("x"));
        assert_eq!(any_value_to_value(AnyValue::Float64(f64::INFINITY)), Value::Missing);
        assert_eq!(any_value_to_value(AnyValue::Float32(f32::NAN)), Value::Missing);
    }

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138).abs() < 1e-3);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[3.0, -1.0, 7.0]), Some((-1.0, 7.0)));
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn test_mode_breaks_ties_by_first_seen() {
        let values = [Value::from("b"), Value::from("a"), Value::from("a"), Value::from("b")];
        assert_eq!(mode(values.iter()), Some(&Value::from("b")));

        let values = [Value::from(1.0), Value::from(2.0), Value::from(2.0)];
        assert_eq!(mode(values.iter()), Some(&Value::from(2.0)));

        assert_eq!(mode(std::iter::empty()), None);
    }
}
