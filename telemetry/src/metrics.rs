//! Metric pipeline.
//!
//! A [`Counter`] accumulates label-partitioned monotonic values; the
//! [`Meter`] is the registry the instruments live in. A [`PeriodicReader`]
//! snapshots the meter on a fixed interval and dispatches the snapshot to a
//! [`MetricExport`], bounded by the exporter's concurrency limit.
//!
//! Backpressure policy: when no export permit is available the snapshot is
//! deferred into a single pending slot rather than dropped; a newer deferred
//! snapshot supersedes the older one. Counters are cumulative, so the newest
//! snapshot subsumes anything it replaces.

use crate::export::MetricExport;
use crate::models::{CounterPoint, CounterSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// Default interval between metric export cycles.
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(1);

/// A monotonic counter instrument, partitioned by label set.
///
/// Cheap to clone; all clones share the same accumulated state. Created once
/// at startup via [`Meter::counter`] and handed to whoever needs it; safe to
/// increment from any number of concurrent operations.
///
/// # Example
///
/// ```
/// use telemetry::metrics::Meter;
///
/// let meter = Meter::new();
/// let requests = meter.counter("http_requests_total");
/// requests.add(1.0, &[("route", "/getProduct"), ("method", "GET")]);
/// assert_eq!(meter.snapshot()[0].total(), 1.0);
/// ```
#[derive(Clone)]
pub struct Counter {
    name: Arc<str>,
    values: Arc<RwLock<HashMap<BTreeMap<String, String>, f64>>>,
}

impl Counter {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The instrument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomically increases the value accumulated under `labels`.
    ///
    /// The counter is monotonic: non-positive amounts are ignored.
    pub fn add(&self, amount: f64, labels: &[(&str, &str)]) {
        if amount <= 0.0 {
            return;
        }
        let key: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut values = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *values.entry(key).or_insert(0.0) += amount;
    }

    /// Takes a consistent snapshot of all label combinations.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let mut points: Vec<CounterPoint> = values
            .iter()
            .map(|(labels, value)| CounterPoint {
                labels: labels.clone(),
                value: *value,
            })
            .collect();
        points.sort_by(|a, b| a.labels.cmp(&b.labels));
        CounterSnapshot::new(self.name.to_string(), points)
    }
}

/// Registry of counter instruments.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct Meter {
    counters: Arc<RwLock<Vec<Counter>>>,
}

impl Meter {
    /// Creates an empty meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter registered under `name`, creating it on first
    /// use. Subsequent calls with the same name return the same instrument.
    #[must_use]
    pub fn counter(&self, name: &str) -> Counter {
        {
            let counters = self
                .counters
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = counters.iter().find(|c| c.name() == name) {
                return existing.clone();
            }
        }
        let mut counters = self
            .counters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // A racing caller may have registered it between the locks.
        if let Some(existing) = counters.iter().find(|c| c.name() == name) {
            return existing.clone();
        }
        let counter = Counter::new(name);
        counters.push(counter.clone());
        counter
    }

    /// Snapshots every registered instrument.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CounterSnapshot> {
        let counters = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        counters.iter().map(Counter::snapshot).collect()
    }
}

/// Timer-driven reader that exports meter snapshots.
pub struct PeriodicReader {
    meter: Meter,
    exporter: Arc<dyn MetricExport>,
    interval: Duration,
    permits: Arc<Semaphore>,
    pending: Arc<Mutex<Option<Vec<CounterSnapshot>>>>,
    superseded: AtomicU64,
}

impl PeriodicReader {
    /// Creates a reader over `meter` exporting through `exporter`.
    ///
    /// `concurrency_limit` bounds in-flight export requests (minimum 1).
    #[must_use]
    pub fn new(
        meter: Meter,
        exporter: Arc<dyn MetricExport>,
        interval: Duration,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            meter,
            exporter,
            interval,
            permits: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            pending: Arc::new(Mutex::new(None)),
            superseded: AtomicU64::new(0),
        }
    }

    /// Number of deferred payloads that were superseded before export.
    #[must_use]
    pub fn superseded_payloads(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    /// Dispatches one snapshot cycle, honoring the concurrency limit.
    ///
    /// With a permit available the export runs in a spawned task; otherwise
    /// the payload is deferred, superseding any payload already waiting.
    /// When an in-flight export finishes it drains the pending slot under
    /// the same permit.
    pub fn dispatch(&self, snapshots: Vec<CounterSnapshot>) {
        if snapshots.is_empty() {
            return;
        }

        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                let exporter = Arc::clone(&self.exporter);
                let pending = Arc::clone(&self.pending);
                tokio::spawn(async move {
                    exporter.export(snapshots).await;
                    loop {
                        let deferred = pending
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        match deferred {
                            Some(batch) => exporter.export(batch).await,
                            None => break,
                        }
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                if pending.replace(snapshots).is_some() {
                    self.superseded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Metric export cycle superseded a deferred payload");
                }
            }
        }
    }

    /// Runs the read loop until `shutdown` flips to true.
    ///
    /// On shutdown a final snapshot is exported directly, so nothing
    /// recorded before the signal is lost to the interval.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the first export happens one
        // full interval after startup.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.dispatch(self.meter.snapshot());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let final_snapshot = self.meter.snapshot();
        if !final_snapshot.is_empty() {
            self.exporter.export(final_snapshot).await;
        }
    }
}
