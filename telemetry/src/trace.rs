//! Trace pipeline.
//!
//! A [`Tracer`] opens one [`Span`] per request-handling operation. The span
//! guard collects attributes, events and a terminal status, and seals the
//! span exactly once on every exit path: explicitly via [`Span::end`], or on
//! drop if the owning operation bailed out early. Sealed spans are enqueued
//! on a bounded queue and exported by a background worker; the producing
//! operation never blocks on delivery.
//!
//! Queue overflow drops the newest span and counts the loss. Export failures
//! stay inside the exporter.

use crate::export::SpanExport;
use crate::models::{ExceptionRecord, SpanData, SpanEvent, SpanStatus};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Default bound on spans buffered ahead of the export worker.
pub const DEFAULT_SPAN_QUEUE_CAPACITY: usize = 2048;

enum SpanMessage {
    Sealed(Box<SpanData>),
    Flush(oneshot::Sender<()>),
}

/// Handle onto the bounded span queue. Cheap to clone.
#[derive(Clone)]
pub struct SpanQueue {
    tx: mpsc::Sender<SpanMessage>,
    dropped: Arc<AtomicU64>,
}

impl SpanQueue {
    /// Number of spans dropped because the queue was full.
    #[must_use]
    pub fn dropped_spans(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, span: SpanData) {
        match self.tx.try_send(SpanMessage::Sealed(Box::new(span))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Span queue full, dropping newest span");
            }
            // Pipeline already shut down; the span is lost like any other
            // telemetry-sink failure.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Creates spans. Cheap to clone; one per service, injected where needed.
#[derive(Clone)]
pub struct Tracer {
    service: Arc<str>,
    queue: SpanQueue,
}

impl Tracer {
    /// Opens a new span for the named operation.
    ///
    /// The span starts with empty attributes and status
    /// [`SpanStatus::Unset`]; nothing is exported until it is sealed.
    #[must_use]
    pub fn start_span(&self, name: impl Into<String>) -> Span {
        let trace_id = Uuid::new_v4().simple().to_string();
        let span_id = trace_id[..16].to_string();
        Span {
            data: SpanData::new(trace_id, span_id, name, self.service.to_string()),
            queue: self.queue.clone(),
            sealed: false,
        }
    }

    /// The service name stamped on every span.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

/// An open span, owned exclusively by the operation that created it.
///
/// Mutations after sealing are silent no-ops. Sealing happens exactly once:
/// the first of an explicit [`Span::end`] call or the guard being dropped.
/// A span sealed by drop while its status is still unset is sealed as
/// [`SpanStatus::Error`], so an early return or panic in the owning
/// operation cannot leak a success-looking span.
///
/// # Example
///
/// ```no_run
/// # fn store_product() -> Result<u64, std::io::Error> { Ok(1) }
/// # fn demo(tracer: &telemetry::trace::Tracer) -> Result<(), std::io::Error> {
/// use telemetry::models::SpanStatus;
///
/// let mut span = tracer.start_span("POST /createProduct");
/// span.set_attribute("product.name", "Desk Lamp");
/// let id = store_product()?; // on error the span still seals, as Error
/// span.add_event("Product saved to database", [("product_id", id.into())]);
/// span.set_status(SpanStatus::Ok, "Product created successfully");
/// span.end();
/// # Ok(())
/// # }
/// ```
pub struct Span {
    data: SpanData,
    queue: SpanQueue,
    sealed: bool,
}

impl Span {
    /// The trace identifier of this span.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.data.trace_id
    }

    /// The span identifier.
    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.data.span_id
    }

    /// Sets a span attribute. No-op after sealing.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Serialize) {
        if self.sealed {
            return;
        }
        self.data.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
    }

    /// Records an event on the span. No-op after sealing.
    pub fn add_event(
        &mut self,
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = (&'static str, serde_json::Value)>,
    ) {
        if self.sealed {
            return;
        }
        self.data.events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        });
    }

    /// Sets the terminal status. Last write wins; no-op after sealing.
    pub fn set_status(&mut self, status: SpanStatus, message: impl Into<String>) {
        if self.sealed {
            return;
        }
        self.data.status = status;
        self.data.status_message = Some(message.into());
    }

    /// Attaches error detail to the span without changing its status.
    ///
    /// Callers still decide the status via [`Span::set_status`]. No-op after
    /// sealing.
    pub fn record_exception<E: std::error::Error + ?Sized>(&mut self, error: &E) {
        if self.sealed {
            return;
        }
        let type_name = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .map(str::to_string);
        self.data.exception = Some(ExceptionRecord {
            message: error.to_string(),
            type_name,
        });
    }

    /// Seals the span and hands it to the export queue.
    ///
    /// Idempotent: a second call does nothing and nothing is re-exported.
    pub fn end(&mut self) {
        self.seal(false);
    }

    fn seal(&mut self, dropped: bool) {
        if self.sealed {
            return;
        }
        self.sealed = true;
        self.data.end_time = Some(Utc::now());
        if dropped && self.data.status == SpanStatus::Unset {
            self.data.status = SpanStatus::Error;
            self.data.status_message = Some("span dropped before end".to_string());
        }
        self.queue.enqueue(self.data.clone());
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.seal(true);
    }
}

/// The background half of the trace pipeline: bounded queue plus worker
/// task draining it into a [`SpanExport`].
pub struct TracePipeline {
    queue: SpanQueue,
    worker: tokio::task::JoinHandle<()>,
}

impl TracePipeline {
    /// Spawns the export worker. Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(exporter: Arc<dyn SpanExport>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = SpanQueue {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let worker = tokio::spawn(run_worker(rx, exporter));
        Self { queue, worker }
    }

    /// Creates a tracer feeding this pipeline.
    #[must_use]
    pub fn tracer(&self, service: impl Into<String>) -> Tracer {
        Tracer {
            service: Arc::from(service.into()),
            queue: self.queue.clone(),
        }
    }

    /// Number of spans dropped at the queue so far.
    #[must_use]
    pub fn dropped_spans(&self) -> u64 {
        self.queue.dropped_spans()
    }

    /// Drains everything currently queued, waiting at most `timeout`.
    ///
    /// Returns false if the worker could not confirm in time; the pipeline
    /// keeps running either way.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .queue
            .tx
            .try_send(SpanMessage::Flush(ack_tx))
            .is_err()
        {
            return false;
        }
        tokio::time::timeout(timeout, ack_rx).await.is_ok()
    }

    /// Flushes with a bounded wait, then stops the worker.
    pub async fn shutdown(&self, timeout: Duration) {
        self.flush(timeout).await;
        self.worker.abort();
    }
}

async fn run_worker(mut rx: mpsc::Receiver<SpanMessage>, exporter: Arc<dyn SpanExport>) {
    while let Some(message) = rx.recv().await {
        let mut batch = Vec::new();
        let mut flush_acks = Vec::new();

        let mut handle = |message: SpanMessage,
                          batch: &mut Vec<SpanData>,
                          acks: &mut Vec<oneshot::Sender<()>>| {
            match message {
                SpanMessage::Sealed(span) => batch.push(*span),
                SpanMessage::Flush(ack) => acks.push(ack),
            }
        };

        handle(message, &mut batch, &mut flush_acks);
        // Drain whatever else is already queued into the same export call.
        while let Ok(message) = rx.try_recv() {
            handle(message, &mut batch, &mut flush_acks);
        }

        if !batch.is_empty() {
            exporter.export(batch).await;
        }
        for ack in flush_acks {
            let _ = ack.send(());
        }
    }
}
