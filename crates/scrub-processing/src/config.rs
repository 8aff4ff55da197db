//! Configuration for the cleaning pipeline and importer.
//!
//! Per-call parameters (fill strategy, outlier threshold overrides) travel
//! with each request; this struct only holds the service-wide defaults.

use serde::{Deserialize, Serialize};

use crate::utils::MISSING_MARKERS;

/// Service-wide defaults for cleaning operations.
///
/// Use [`CleaningConfig::builder()`] to create a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use scrub_processing::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .outlier_threshold(2.5)
///     .normalize_range(-1.0, 1.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Default number of standard deviations beyond which a value is an outlier.
    /// Default: 3.0
    pub outlier_threshold: f64,

    /// Numeric columns with fewer non-missing values are not scored for outliers.
    /// Default: 3
    pub min_outlier_values: usize,

    /// Lower bound of the min-max normalization target range.
    /// Default: 0.0
    pub normalize_min: f64,

    /// Upper bound of the min-max normalization target range.
    /// Default: 1.0
    pub normalize_max: f64,

    /// Emit a progress update every this many rows.
    /// Default: 1000
    pub progress_interval: usize,

    /// Text cells equal (case-insensitively) to one of these become missing on import.
    /// Default: [`MISSING_MARKERS`]
    pub missing_markers: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: 3.0,
            min_outlier_values: 3,
            normalize_min: 0.0,
            normalize_max: 1.0,
            progress_interval: 1000,
            missing_markers: MISSING_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidOutlierThreshold(
                self.outlier_threshold,
            ));
        }

        if self.min_outlier_values < 2 {
            return Err(ConfigValidationError::InvalidMinOutlierValues(
                self.min_outlier_values,
            ));
        }

        if !self.normalize_min.is_finite()
            || !self.normalize_max.is_finite()
            || self.normalize_min >= self.normalize_max
        {
            return Err(ConfigValidationError::InvalidNormalizeRange {
                min: self.normalize_min,
                max: self.normalize_max,
            });
        }

        if self.progress_interval == 0 {
            return Err(ConfigValidationError::InvalidProgressInterval);
        }

        Ok(())
    }

    /// Whether a text cell should be read as missing.
    pub fn is_missing_marker(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.missing_markers
            .iter()
            .any(|m| m.eq_ignore_ascii_case(trimmed))
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid outlier threshold: {0} (must be a positive number)")]
    InvalidOutlierThreshold(f64),

    #[error("Invalid minimum outlier sample size: {0} (must be at least 2)")]
    InvalidMinOutlierValues(usize),

    #[error("Invalid normalization range [{min}, {max}] (min must be below max)")]
    InvalidNormalizeRange { min: f64, max: f64 },

    #[error("Invalid progress interval: must be at least 1 row")]
    InvalidProgressInterval,
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    outlier_threshold: Option<f64>,
    min_outlier_values: Option<usize>,
    normalize_range: Option<(f64, f64)>,
    progress_interval: Option<usize>,
    missing_markers: Option<Vec<String>>,
}

impl CleaningConfigBuilder {
    /// Set the default outlier threshold, in standard deviations.
    pub fn outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = Some(threshold);
        self
    }

    /// Set the minimum number of values a column needs to be scored.
    pub fn min_outlier_values(mut self, min: usize) -> Self {
        self.min_outlier_values = Some(min);
        self
    }

    /// Set the min-max normalization target range.
    pub fn normalize_range(mut self, min: f64, max: f64) -> Self {
        self.normalize_range = Some((min, max));
        self
    }

    /// Set how often (in rows) operations report progress.
    pub fn progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = Some(rows);
        self
    }

    /// Replace the list of text markers read as missing on import.
    pub fn missing_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let defaults = CleaningConfig::default();
        let (normalize_min, normalize_max) = self
            .normalize_range
            .unwrap_or((defaults.normalize_min, defaults.normalize_max));

        let config = CleaningConfig {
            outlier_threshold: self.outlier_threshold.unwrap_or(defaults.outlier_threshold),
            min_outlier_values: self
                .min_outlier_values
                .unwrap_or(defaults.min_outlier_values),
            normalize_min,
            normalize_max,
            progress_interval: self.progress_interval.unwrap_or(defaults.progress_interval),
            missing_markers: self.missing_markers.unwrap_or(defaults.missing_markers),
        };

        config.validate()?;
        Ok(config)
    }
}
