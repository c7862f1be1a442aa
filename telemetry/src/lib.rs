//! Storelens Telemetry Core
//!
//! This crate contains the observability wiring for the Storelens product
//! service: a two-sink logger, a trace pipeline with an OTLP/HTTP exporter,
//! and a counter + periodic-reader metric pipeline.
//!
//! # Modules
//!
//! - [`logger`] - console + file logger with a fixed service tag
//! - [`trace`] - tracer, span guard and the span export pipeline
//! - [`metrics`] - counter instruments, meter and the periodic reader
//! - [`export`] - exporter configuration and OTLP/HTTP exporters
//! - [`otlp`] - OTLP JSON wire types
//! - [`models`] - payload types shared by the pipelines
//!
//! All of it hangs off a single [`Telemetry`] handle with an explicit
//! lifecycle: built once at process start, injected wherever requests are
//! handled, shut down with a bounded flush at termination. There is no
//! ambient global state.
//!
//! # Example
//!
//! ```no_run
//! use telemetry::{Telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let telemetry = Telemetry::init(TelemetryConfig::from_env()?)?;
//!
//!     let requests = telemetry.meter().counter("http_requests_total");
//!     requests.add(1.0, &[("route", "/greet")]);
//!
//!     let mut span = telemetry.tracer().start_span("GET /greet");
//!     span.set_status(telemetry::models::SpanStatus::Ok, "greeted");
//!     span.end();
//!
//!     telemetry.shutdown(std::time::Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod export;
pub mod logger;
pub mod metrics;
pub mod models;
pub mod otlp;
pub mod trace;

pub use config::TelemetryConfig;
pub use logger::Logger;
pub use metrics::{Counter, Meter};
pub use trace::{Span, Tracer};

use crate::export::{
    ExporterConfig, MetricExport, OtlpMetricExporter, OtlpTraceExporter, SpanExport,
};
use crate::metrics::PeriodicReader;
use crate::trace::TracePipeline;
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The assembled telemetry stack.
///
/// Owns the logger, the trace pipeline and the metric pipeline, and is the
/// explicit dependency handed to request-handling code. Dropping it without
/// calling [`Telemetry::shutdown`] abandons buffered telemetry; the request
/// path is unaffected either way.
pub struct Telemetry {
    logger: Arc<Logger>,
    tracer: Tracer,
    meter: Meter,
    trace_pipeline: TracePipeline,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Telemetry {
    /// Builds the full stack with OTLP/HTTP exporters per `config`.
    ///
    /// Must be called within a Tokio runtime: the trace worker and the
    /// periodic metric reader are spawned here.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened. Exporter
    /// endpoints are not probed; an unreachable collector only ever costs
    /// telemetry, never startup.
    pub fn init(config: TelemetryConfig) -> Result<Self> {
        let logger = Arc::new(Logger::new(&config.service_name, &config.log_file)?);

        let mut trace_config = ExporterConfig::new(&config.traces_endpoint);
        let mut metric_config = ExporterConfig::new(&config.metrics_endpoint)
            .with_concurrency_limit(config.export_concurrency_limit);
        for (name, value) in &config.export_headers {
            trace_config = trace_config.with_header(name, value);
            metric_config = metric_config.with_header(name, value);
        }

        let span_exporter = Arc::new(OtlpTraceExporter::new(trace_config));
        let metric_exporter = Arc::new(OtlpMetricExporter::new(
            metric_config,
            &config.service_name,
        ));

        Ok(Self::with_exporters(
            config,
            logger,
            span_exporter,
            metric_exporter,
        ))
    }

    /// Builds the stack around caller-supplied exporters.
    ///
    /// This is useful for development and testing: pair it with the capture
    /// exporters from [`export`] to observe exactly what the pipelines emit.
    #[must_use]
    pub fn with_exporters(
        config: TelemetryConfig,
        logger: Arc<Logger>,
        span_exporter: Arc<dyn SpanExport>,
        metric_exporter: Arc<dyn MetricExport>,
    ) -> Self {
        let trace_pipeline = TracePipeline::spawn(span_exporter, config.span_queue_capacity);
        let tracer = trace_pipeline.tracer(&config.service_name);
        let meter = Meter::new();

        let reader = Arc::new(PeriodicReader::new(
            meter.clone(),
            metric_exporter,
            config.export_interval,
            config.export_concurrency_limit,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reader_handle = tokio::spawn(reader.run(shutdown_rx));

        Self {
            logger,
            tracer,
            meter,
            trace_pipeline,
            reader_handle: Mutex::new(Some(reader_handle)),
            shutdown_tx,
        }
    }

    /// The service logger.
    #[must_use]
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// The tracer feeding the span pipeline.
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The meter holding the counter instruments.
    #[must_use]
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Number of spans dropped at the queue so far.
    #[must_use]
    pub fn dropped_spans(&self) -> u64 {
        self.trace_pipeline.dropped_spans()
    }

    /// Stops both pipelines, giving buffered data a bounded chance to
    /// export.
    ///
    /// The metric reader exports a final snapshot; the span queue is
    /// drained. Returns once everything flushed or `timeout` elapsed,
    /// whichever comes first. Shutdown proceeds regardless of flush
    /// success.
    pub async fn shutdown(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let _ = self.shutdown_tx.send(true);

        let handle = self
            .reader_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                tracing::warn!("Metric reader did not stop before the shutdown deadline");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.trace_pipeline.shutdown(remaining).await;
    }
}
