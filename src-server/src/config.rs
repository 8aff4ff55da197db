//! Server configuration.
//!
//! Every flag has an environment fallback so the server can be configured
//! from a `.env` file (loaded with `dotenv` before parsing).

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use scrub_processing::{CleaningConfig, ConfigValidationError};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "HTTP API for the scrub data cleaning pipeline")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "SCRUB_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SCRUB_PORT", default_value = "5000")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "SCRUB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seconds a cleaning operation may run before it is marked failed
    #[arg(long, env = "SCRUB_OPERATION_TIMEOUT_SECS", default_value = "300")]
    pub operation_timeout_secs: u64,

    /// How often the scheduler looks for due import jobs, in milliseconds
    #[arg(long, env = "SCRUB_SCHEDULER_TICK_MS", default_value = "1000")]
    pub scheduler_tick_ms: u64,

    /// Default outlier threshold in standard deviations
    #[arg(long, env = "SCRUB_OUTLIER_THRESHOLD", default_value = "3.0")]
    pub outlier_threshold: f64,

    /// Minimum non-missing values for a column to be scored for outliers
    #[arg(long, env = "SCRUB_MIN_OUTLIER_VALUES", default_value = "3")]
    pub min_outlier_values: usize,

    /// Lower bound of the min-max target range
    #[arg(long, env = "SCRUB_NORMALIZE_MIN", default_value = "0.0")]
    pub normalize_min: f64,

    /// Upper bound of the min-max target range
    #[arg(long, env = "SCRUB_NORMALIZE_MAX", default_value = "1.0")]
    pub normalize_max: f64,

    /// Rows between progress updates
    #[arg(long, env = "SCRUB_PROGRESS_INTERVAL", default_value = "1000")]
    pub progress_interval: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = CleaningConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            operation_timeout_secs: 300,
            scheduler_tick_ms: 1000,
            outlier_threshold: defaults.outlier_threshold,
            min_outlier_values: defaults.min_outlier_values,
            normalize_min: defaults.normalize_min,
            normalize_max: defaults.normalize_max,
            progress_interval: defaults.progress_interval,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms.max(1))
    }

    /// Build the validated pipeline configuration.
    pub fn cleaning_config(&self) -> Result<CleaningConfig, ConfigValidationError> {
        CleaningConfig::builder()
            .outlier_threshold(self.outlier_threshold)
            .min_outlier_values(self.min_outlier_values)
            .normalize_range(self.normalize_min, self.normalize_max)
            .progress_interval(self.progress_interval)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cleaning_defaults() {
        let config = ServerConfig::default();
        let cleaning = config.cleaning_config().unwrap();
        assert_eq!(cleaning.outlier_threshold, CleaningConfig::default().outlier_threshold);
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_cli_overrides() {
        let config = ServerConfig::try_parse_from([
            "scrub-server",
            "--port",
            "8080",
            "--normalize-min=-1",
            "--normalize-max=1",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        let cleaning = config.cleaning_config().unwrap();
        assert_eq!(cleaning.normalize_min, -1.0);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let config = ServerConfig {
            normalize_min: 2.0,
            normalize_max: 1.0,
            ..ServerConfig::default()
        };
        assert!(config.cleaning_config().is_err());
    }
}
