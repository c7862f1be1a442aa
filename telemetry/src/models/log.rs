//! Log record model.
//!
//! Defines the `LogRecord` structure emitted by the [`Logger`](crate::logger::Logger)
//! to its console and file sinks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debug information.
    Trace,
    /// Debug information.
    Debug,
    /// Informational messages.
    Info,
    /// Warning conditions.
    Warn,
    /// Error conditions.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

/// A single log record.
///
/// Created per log call and immutable once handed to the sinks. The console
/// sink receives the plain-text layout from [`LogRecord::format_plain`]; the
/// file sink receives the record serialized as one JSON line.
///
/// # Example
///
/// ```
/// use telemetry::models::{LogLevel, LogRecord};
///
/// let record = LogRecord::new(LogLevel::Info, "Server starting...", "product-service")
///     .with_field("port", 5001);
///
/// assert!(record.format_plain().contains("[product-service]"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp when the log event occurred.
    pub timestamp: DateTime<Utc>,

    /// Severity level.
    #[serde(default)]
    pub level: LogLevel,

    /// Name of the service that produced the record.
    pub service: String,

    /// The log message.
    pub message: String,

    /// Additional structured fields.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a new log record with the current timestamp.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            service: service.into(),
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Adds a structured field to the record.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.fields.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Renders the plain-text console layout:
    /// `{timestamp} {level} [{service}] {message}`.
    #[must_use]
    pub fn format_plain(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.service,
            self.message
        )
    }
}
