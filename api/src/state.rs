//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::store::{InMemoryProductStore, ProductStore};
use std::sync::Arc;
use telemetry::{Counter, Logger, Telemetry, Tracer};

/// Application state shared across all request handlers.
///
/// Carries the product store and the telemetry stack. The telemetry handle
/// is built once at startup and injected here; handlers reach the tracer,
/// logger and request counter through this state rather than any global.
#[derive(Clone)]
pub struct AppState {
    /// The product storage backend.
    store: Arc<dyn ProductStore>,
    /// The telemetry stack.
    telemetry: Arc<Telemetry>,
    /// Counter of handled HTTP requests, labeled by method and route.
    requests: Counter,
}

impl AppState {
    /// Creates a new application state with the given store and telemetry.
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>, telemetry: Arc<Telemetry>) -> Self {
        let requests = telemetry.meter().counter("http_requests_total");
        Self {
            store,
            telemetry,
            requests,
        }
    }

    /// Creates a new application state with an in-memory product store.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store(telemetry: Arc<Telemetry>) -> Self {
        Self::new(InMemoryProductStore::new_shared(), telemetry)
    }

    /// Returns a reference to the product store.
    #[must_use]
    pub fn store(&self) -> &dyn ProductStore {
        self.store.as_ref()
    }

    /// Returns the telemetry stack.
    #[must_use]
    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    /// Returns the tracer.
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        self.telemetry.tracer()
    }

    /// Returns the service logger.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        self.telemetry.logger().as_ref()
    }

    /// Returns the request counter.
    #[must_use]
    pub fn requests(&self) -> &Counter {
        &self.requests
    }
}
