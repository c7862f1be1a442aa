//! Span data model.
//!
//! Defines the sealed form of a span as handed from the
//! [`Span`](crate::trace::Span) guard to the trace pipeline for export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// No status has been set.
    #[default]
    Unset,
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error,
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An event recorded within a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    /// The name of the event.
    pub name: String,
    /// Timestamp when the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Additional attributes for the event.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Error detail attached to a span via `record_exception`.
///
/// Recording an exception does not change the span status; callers set the
/// status separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// The error message.
    pub message: String,
    /// The error type name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// The data carried by one span.
///
/// A `SpanData` is owned exclusively by the [`Span`](crate::trace::Span)
/// guard that created it until the guard seals it, after which it is
/// immutable and belongs to the trace pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanData {
    /// Identifier of the trace this span belongs to (32 hex chars).
    pub trace_id: String,

    /// Identifier of this span (16 hex chars).
    pub span_id: String,

    /// The name/operation of this span.
    pub name: String,

    /// The service that produced this span.
    pub service: String,

    /// Timestamp when the operation started.
    pub start_time: DateTime<Utc>,

    /// Timestamp when the span was sealed. `None` while the span is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Span attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Events recorded during the operation, in call order.
    #[serde(default)]
    pub events: Vec<SpanEvent>,

    /// Terminal status of the operation.
    #[serde(default)]
    pub status: SpanStatus,

    /// Free-form message accompanying the status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Error detail recorded via `record_exception`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionRecord>,
}

impl SpanData {
    /// Creates a new open span with the current time as start.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        name: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            name: name.into(),
            service: service.into(),
            start_time: Utc::now(),
            end_time: None,
            attributes: HashMap::new(),
            events: Vec::new(),
            status: SpanStatus::default(),
            status_message: None,
            exception: None,
        }
    }

    /// Returns true if the span has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Returns the duration in milliseconds, or `None` for an open span.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}
