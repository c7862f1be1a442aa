//! Telemetry configuration.
//!
//! Handles loading telemetry settings from environment variables with
//! sensible defaults. Configuration is static for the process lifetime;
//! there is no hot-reload.

use crate::export::{DEFAULT_METRICS_ENDPOINT, DEFAULT_TRACES_ENDPOINT};
use crate::metrics::DEFAULT_EXPORT_INTERVAL;
use crate::trace::DEFAULT_SPAN_QUEUE_CAPACITY;
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Telemetry configuration.
///
/// Configuration values can be set via environment variables:
/// - `STORELENS_SERVICE_NAME`: service tag on logs and telemetry (default: "product-service")
/// - `STORELENS_LOG_FILE`: file-sink path (default: "combined.log")
/// - `STORELENS_TRACES_ENDPOINT`: collector traces URL (default: <http://localhost:4318/v1/traces>)
/// - `STORELENS_METRICS_ENDPOINT`: collector metrics URL (default: <http://localhost:4318/v1/metrics>)
/// - `STORELENS_EXPORT_HEADERS`: extra exporter headers as `name=value,name=value`
/// - `STORELENS_METRIC_INTERVAL_MS`: metric export interval (default: 1000)
/// - `STORELENS_EXPORT_CONCURRENCY`: max in-flight metric exports (default: 1)
/// - `STORELENS_SPAN_QUEUE_CAPACITY`: span buffer bound (default: 2048)
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped on every log record, span and metric resource.
    pub service_name: String,
    /// Path of the append-only log file.
    pub log_file: PathBuf,
    /// Collector endpoint for traces.
    pub traces_endpoint: String,
    /// Collector endpoint for metrics.
    pub metrics_endpoint: String,
    /// Extra headers sent with every export request.
    pub export_headers: HashMap<String, String>,
    /// Interval between metric export cycles.
    pub export_interval: Duration,
    /// Upper bound on concurrently in-flight metric exports.
    pub export_concurrency_limit: usize,
    /// Bound on spans buffered ahead of the trace export worker.
    pub span_queue_capacity: usize,
}

impl TelemetryConfig {
    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let service_name = std::env::var("STORELENS_SERVICE_NAME")
            .unwrap_or_else(|_| "product-service".to_string());

        let log_file = std::env::var("STORELENS_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("combined.log"));

        let traces_endpoint = std::env::var("STORELENS_TRACES_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_TRACES_ENDPOINT.to_string());

        let metrics_endpoint = std::env::var("STORELENS_METRICS_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_METRICS_ENDPOINT.to_string());

        let export_headers = std::env::var("STORELENS_EXPORT_HEADERS")
            .map(|raw| parse_headers(&raw))
            .unwrap_or_default();

        let export_interval = std::env::var("STORELENS_METRIC_INTERVAL_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()?
            .map_or(DEFAULT_EXPORT_INTERVAL, Duration::from_millis);

        let export_concurrency_limit = std::env::var("STORELENS_EXPORT_CONCURRENCY")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()?
            .unwrap_or(1);

        let span_queue_capacity = std::env::var("STORELENS_SPAN_QUEUE_CAPACITY")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()?
            .unwrap_or(DEFAULT_SPAN_QUEUE_CAPACITY);

        Ok(Self {
            service_name,
            log_file,
            traces_endpoint,
            metrics_endpoint,
            export_headers,
            export_interval,
            export_concurrency_limit,
            span_queue_capacity,
        })
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "product-service".to_string(),
            log_file: PathBuf::from("combined.log"),
            traces_endpoint: DEFAULT_TRACES_ENDPOINT.to_string(),
            metrics_endpoint: DEFAULT_METRICS_ENDPOINT.to_string(),
            export_headers: HashMap::new(),
            export_interval: DEFAULT_EXPORT_INTERVAL,
            export_concurrency_limit: 1,
            span_queue_capacity: DEFAULT_SPAN_QUEUE_CAPACITY,
        }
    }
}

/// Parses `name=value,name=value` into a header map.
///
/// Entries without `=` are skipped.
fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "product-service");
        assert_eq!(config.log_file, PathBuf::from("combined.log"));
        assert_eq!(config.traces_endpoint, DEFAULT_TRACES_ENDPOINT);
        assert_eq!(config.metrics_endpoint, DEFAULT_METRICS_ENDPOINT);
        assert_eq!(config.export_interval, Duration::from_secs(1));
        assert_eq!(config.export_concurrency_limit, 1);
        assert_eq!(config.span_queue_capacity, 2048);
        assert!(config.export_headers.is_empty());
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("authorization=Bearer token, x-tenant =acme");
        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get("authorization"),
            Some(&"Bearer token".to_string())
        );
        assert_eq!(headers.get("x-tenant"), Some(&"acme".to_string()));
    }

    #[test]
    fn test_parse_headers_skips_malformed_entries() {
        let headers = parse_headers("valid=yes,malformed,also-bad");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("valid"), Some(&"yes".to_string()));
    }

    #[test]
    fn test_parse_headers_empty() {
        assert!(parse_headers("").is_empty());
    }
}
