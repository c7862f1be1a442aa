//! Metric snapshot model.
//!
//! Defines the payload the periodic reader hands to the metric exporter:
//! a consistent point-in-time view of every counter instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One accumulated value for a particular label combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterPoint {
    /// The label set this value was accumulated under.
    pub labels: BTreeMap<String, String>,
    /// The accumulated value.
    pub value: f64,
}

/// A point-in-time snapshot of a single counter instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// The instrument name.
    pub name: String,
    /// One point per label combination seen so far.
    pub points: Vec<CounterPoint>,
    /// When the snapshot was taken.
    pub collected_at: DateTime<Utc>,
}

impl CounterSnapshot {
    /// Creates a snapshot with the current timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, points: Vec<CounterPoint>) -> Self {
        Self {
            name: name.into(),
            points,
            collected_at: Utc::now(),
        }
    }

    /// Sums the values across all label combinations.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_snapshot_total() {
        let snapshot = CounterSnapshot::new(
            "http_requests_total",
            vec![
                CounterPoint {
                    labels: BTreeMap::from([("route".to_string(), "/greet".to_string())]),
                    value: 3.0,
                },
                CounterPoint {
                    labels: BTreeMap::from([("route".to_string(), "/getProduct".to_string())]),
                    value: 4.0,
                },
            ],
        );

        assert_eq!(snapshot.total(), 7.0);
        assert_eq!(snapshot.points.len(), 2);
    }

    #[test]
    fn test_counter_snapshot_empty() {
        let snapshot = CounterSnapshot::new("unused", vec![]);
        assert_eq!(snapshot.total(), 0.0);
    }

    #[test]
    fn test_counter_snapshot_serialization() {
        let snapshot = CounterSnapshot::new(
            "http_requests_total",
            vec![CounterPoint {
                labels: BTreeMap::from([("method".to_string(), "GET".to_string())]),
                value: 1.0,
            }],
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"name\":\"http_requests_total\""));
        assert!(json.contains("\"method\":\"GET\""));
    }
}
