//! Exporters and their configuration.
//!
//! Both pipelines hand finished payloads to an exporter behind a trait, so
//! tests can substitute capturing doubles the same way the product store
//! swaps between in-memory and database backends. The production
//! implementations serialize to OTLP/JSON and POST to a collector endpoint.
//!
//! Exporters are a pure best-effort boundary: delivery failures are logged
//! at debug level and swallowed, never retried here and never surfaced to
//! the request path.

use crate::models::{CounterSnapshot, SpanData};
use crate::otlp;
use async_trait::async_trait;
use std::collections::HashMap;

/// Default collector endpoint for traces.
pub const DEFAULT_TRACES_ENDPOINT: &str = "http://localhost:4318/v1/traces";

/// Default collector endpoint for metrics.
pub const DEFAULT_METRICS_ENDPOINT: &str = "http://localhost:4318/v1/metrics";

/// Static configuration for one exporter.
///
/// Immutable after construction; one instance per exporter.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Destination URL (a collector `/v1/traces` or `/v1/metrics` path).
    pub endpoint: String,
    /// Extra request headers (authentication and the like).
    pub headers: HashMap<String, String>,
    /// Upper bound on concurrently in-flight export requests.
    pub concurrency_limit: usize,
}

impl ExporterConfig {
    /// Creates a config for the given endpoint with no extra headers and a
    /// concurrency limit of 1.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            concurrency_limit: 1,
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the concurrency limit (clamped to at least 1).
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRACES_ENDPOINT)
    }
}

/// Sink for sealed spans.
#[async_trait]
pub trait SpanExport: Send + Sync {
    /// Transmits a batch of sealed spans. Must not fail the caller.
    async fn export(&self, spans: Vec<SpanData>);
}

/// Sink for counter snapshots.
#[async_trait]
pub trait MetricExport: Send + Sync {
    /// Transmits one snapshot cycle. Must not fail the caller.
    async fn export(&self, snapshots: Vec<CounterSnapshot>);
}

/// OTLP/HTTP trace exporter.
pub struct OtlpTraceExporter {
    client: reqwest::Client,
    config: ExporterConfig,
}

impl OtlpTraceExporter {
    /// Creates a trace exporter for the configured collector endpoint.
    #[must_use]
    pub fn new(config: ExporterConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SpanExport for OtlpTraceExporter {
    async fn export(&self, spans: Vec<SpanData>) {
        if spans.is_empty() {
            return;
        }
        let body = otlp::trace_request(&spans);
        post_json(&self.client, &self.config, &body, "traces").await;
    }
}

/// OTLP/HTTP metric exporter.
pub struct OtlpMetricExporter {
    client: reqwest::Client,
    config: ExporterConfig,
    service: String,
}

impl OtlpMetricExporter {
    /// Creates a metric exporter for the configured collector endpoint.
    #[must_use]
    pub fn new(config: ExporterConfig, service: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            service: service.into(),
        }
    }
}

#[async_trait]
impl MetricExport for OtlpMetricExporter {
    async fn export(&self, snapshots: Vec<CounterSnapshot>) {
        if snapshots.is_empty() {
            return;
        }
        let body = otlp::metrics_request(&self.service, &snapshots);
        post_json(&self.client, &self.config, &body, "metrics").await;
    }
}

/// Span exporter that keeps everything in memory.
///
/// This is useful for development and testing, the same way the in-memory
/// product store stands in for the database.
#[derive(Debug, Default)]
pub struct CaptureSpanExporter {
    spans: std::sync::Mutex<Vec<SpanData>>,
}

impl CaptureSpanExporter {
    /// Creates an empty capture exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every span exported so far.
    #[must_use]
    pub fn spans(&self) -> Vec<SpanData> {
        match self.spans.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SpanExport for CaptureSpanExporter {
    async fn export(&self, spans: Vec<SpanData>) {
        match self.spans.lock() {
            Ok(mut guard) => guard.extend(spans),
            Err(poisoned) => poisoned.into_inner().extend(spans),
        }
    }
}

/// Metric exporter that keeps every snapshot cycle in memory.
#[derive(Debug, Default)]
pub struct CaptureMetricExporter {
    cycles: std::sync::Mutex<Vec<Vec<CounterSnapshot>>>,
}

impl CaptureMetricExporter {
    /// Creates an empty capture exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every export cycle received so far.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<CounterSnapshot>> {
        match self.cycles.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MetricExport for CaptureMetricExporter {
    async fn export(&self, snapshots: Vec<CounterSnapshot>) {
        match self.cycles.lock() {
            Ok(mut guard) => guard.push(snapshots),
            Err(poisoned) => poisoned.into_inner().push(snapshots),
        }
    }
}

/// POSTs a JSON payload to the collector, swallowing every failure.
async fn post_json<T: serde::Serialize>(
    client: &reqwest::Client,
    config: &ExporterConfig,
    body: &T,
    signal: &str,
) {
    let mut request = client.post(&config.endpoint).json(body);
    for (name, value) in &config.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    match request.send().await {
        Ok(response) if !response.status().is_success() => {
            tracing::debug!(
                signal,
                status = %response.status(),
                endpoint = %config.endpoint,
                "Collector rejected export"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(
                signal,
                error = %e,
                endpoint = %config.endpoint,
                "Export failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_config_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.endpoint, DEFAULT_TRACES_ENDPOINT);
        assert!(config.headers.is_empty());
        assert_eq!(config.concurrency_limit, 1);
    }

    #[test]
    fn test_exporter_config_builder() {
        let config = ExporterConfig::new(DEFAULT_METRICS_ENDPOINT)
            .with_header("authorization", "Bearer token")
            .with_concurrency_limit(4);

        assert_eq!(config.endpoint, DEFAULT_METRICS_ENDPOINT);
        assert_eq!(
            config.headers.get("authorization"),
            Some(&"Bearer token".to_string())
        );
        assert_eq!(config.concurrency_limit, 4);
    }

    #[test]
    fn test_concurrency_limit_floor() {
        let config = ExporterConfig::default().with_concurrency_limit(0);
        assert_eq!(config.concurrency_limit, 1);
    }

    #[tokio::test]
    async fn test_trace_export_failure_is_swallowed() {
        // Nothing listens on this port; the export must not panic or error.
        let exporter =
            OtlpTraceExporter::new(ExporterConfig::new("http://127.0.0.1:1/v1/traces"));
        exporter
            .export(vec![crate::models::SpanData::new("t", "s", "op", "svc")])
            .await;
    }

    #[tokio::test]
    async fn test_metric_export_skips_empty_batch() {
        let exporter = OtlpMetricExporter::new(
            ExporterConfig::new("http://127.0.0.1:1/v1/metrics"),
            "svc",
        );
        // No request is attempted for an empty snapshot set.
        exporter.export(vec![]).await;
    }
}
