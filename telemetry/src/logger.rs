//! Two-sink service logger.
//!
//! Formats [`LogRecord`]s and writes them synchronously to a console stream
//! (plain text) and an append-only file (JSON lines). Every record carries
//! the fixed service tag.
//!
//! The logger is best-effort: a sink write failure is swallowed and counted,
//! never surfaced to the caller. Observability must not become a reason the
//! request path fails.

use crate::models::{LogLevel, LogRecord};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Synchronous logger with a console sink and an optional file sink.
///
/// Writes within a single sink are strictly ordered by call sequence; the
/// two sinks are locked independently, so cross-sink ordering is not
/// guaranteed.
///
/// # Example
///
/// ```
/// use telemetry::logger::Logger;
///
/// let (logger, _buf) = Logger::with_capture_console("product-service");
/// logger.info("Server starting...");
/// logger.error("Error in Create Product: connection reset");
/// ```
pub struct Logger {
    service: String,
    console: Mutex<Box<dyn Write + Send>>,
    file: Option<Mutex<File>>,
    write_failures: AtomicU64,
}

impl Logger {
    /// Creates a logger writing to stdout and appending to `log_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be created or opened for
    /// appending. This is a startup-time failure; once constructed, the
    /// logger never errors.
    pub fn new(service: impl Into<String>, log_file: impl AsRef<Path>) -> Result<Self> {
        let path = log_file.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok(Self {
            service: service.into(),
            console: Mutex::new(Box::new(std::io::stdout())),
            file: Some(Mutex::new(file)),
            write_failures: AtomicU64::new(0),
        })
    }

    /// Creates a console-only logger writing to stdout.
    #[must_use]
    pub fn console_only(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            console: Mutex::new(Box::new(std::io::stdout())),
            file: None,
            write_failures: AtomicU64::new(0),
        }
    }

    /// Creates a console-only logger whose console sink is an in-memory
    /// buffer, returned alongside the logger for inspection in tests.
    #[must_use]
    pub fn with_capture_console(
        service: impl Into<String>,
    ) -> (Self, std::sync::Arc<Mutex<Vec<u8>>>) {
        let buf = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = SharedBuf(std::sync::Arc::clone(&buf));
        let logger = Self {
            service: service.into(),
            console: Mutex::new(Box::new(sink)),
            file: None,
            write_failures: AtomicU64::new(0),
        };
        (logger, buf)
    }

    /// Replaces the file sink with the given open file.
    #[must_use]
    pub fn with_file(mut self, file: File) -> Self {
        self.file = Some(Mutex::new(file));
        self
    }

    /// The service tag stamped on every record.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of sink writes that have failed and been swallowed.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Logs a message at the given level.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.write_record(LogRecord::new(level, message, self.service.clone()));
    }

    /// Logs a message with additional structured fields.
    pub fn log_with(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        fields: HashMap<String, serde_json::Value>,
    ) {
        let mut record = LogRecord::new(level, message, self.service.clone());
        record.fields = fields;
        self.write_record(record);
    }

    /// Logs at info level.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Logs at warn level.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs at error level.
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    fn write_record(&self, record: LogRecord) {
        // Console sink: plain text layout.
        {
            let line = record.format_plain();
            let mut console = match self.console.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if writeln!(console, "{line}").is_err() {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        // File sink: one JSON object per line.
        if let Some(ref file) = self.file {
            let mut file = match file.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let ok = serde_json::to_string(&record)
                .map_err(|_| ())
                .and_then(|json| writeln!(file, "{json}").map_err(|_| ()))
                .is_ok();
            if !ok {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// `Write` adapter over a shared in-memory buffer.
struct SharedBuf(std::sync::Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| std::io::Error::other("buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
