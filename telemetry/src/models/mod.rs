//! Data models for the Storelens telemetry core.
//!
//! This module contains the payload types carried by the logger and the
//! trace/metric pipelines.

pub mod log;
pub mod metric;
pub mod span;

pub use log::{LogLevel, LogRecord};
pub use metric::{CounterPoint, CounterSnapshot};
pub use span::{ExceptionRecord, SpanData, SpanEvent, SpanStatus};
