//! OTLP-over-HTTP JSON wire types.
//!
//! Serde structures mirroring the OTLP JSON protobuf mapping for the trace
//! and metric export requests, plus conversions from the internal models.
//! The wire contract itself is the standard OTLP protocol and is not
//! redesigned here: field names are camelCase and 64-bit nanosecond
//! timestamps are encoded as decimal strings, as the mapping requires.

use crate::models::{CounterSnapshot, SpanData, SpanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Span kind for a server-side request handling operation.
const SPAN_KIND_SERVER: i32 = 2;

/// Cumulative aggregation temporality.
const AGGREGATION_TEMPORALITY_CUMULATIVE: i32 = 2;

/// A single typed attribute value.
///
/// Exactly one field is set; the rest are omitted from the JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyValue {
    /// String value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Boolean value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    /// Integer value (stringified per the JSON mapping).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int_value: Option<String>,
    /// Double value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    /// Nested array value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_value: Option<ArrayValue>,
}

/// An array of attribute values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    /// The contained values.
    pub values: Vec<AnyValue>,
}

/// A key with a typed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    /// The attribute key.
    pub key: String,
    /// The attribute value.
    pub value: AnyValue,
}

/// The entity producing telemetry (carries `service.name`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    /// Resource attributes.
    pub attributes: Vec<KeyValue>,
}

/// The instrumentation scope that produced a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentationScope {
    /// Scope name.
    pub name: String,
}

/// Body of `POST {collector}/v1/traces`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTraceServiceRequest {
    /// Spans grouped by resource.
    pub resource_spans: Vec<ResourceSpans>,
}

/// Spans from one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    /// The producing resource.
    pub resource: Resource,
    /// Spans grouped by instrumentation scope.
    pub scope_spans: Vec<ScopeSpans>,
}

/// Spans from one instrumentation scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSpans {
    /// The producing scope.
    pub scope: InstrumentationScope,
    /// The spans.
    pub spans: Vec<OtlpSpan>,
}

/// One span on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSpan {
    /// Trace identifier (32 lowercase hex chars).
    pub trace_id: String,
    /// Span identifier (16 lowercase hex chars).
    pub span_id: String,
    /// Operation name.
    pub name: String,
    /// Span kind.
    pub kind: i32,
    /// Start timestamp, nanoseconds since epoch.
    pub start_time_unix_nano: String,
    /// End timestamp, nanoseconds since epoch.
    pub end_time_unix_nano: String,
    /// Span attributes.
    pub attributes: Vec<KeyValue>,
    /// Span events.
    pub events: Vec<OtlpSpanEvent>,
    /// Terminal status.
    pub status: OtlpStatus,
}

/// One span event on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSpanEvent {
    /// Event timestamp, nanoseconds since epoch.
    pub time_unix_nano: String,
    /// Event name.
    pub name: String,
    /// Event attributes.
    pub attributes: Vec<KeyValue>,
}

/// Span status on the wire (0 = unset, 1 = ok, 2 = error).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtlpStatus {
    /// Status code.
    pub code: i32,
    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST {collector}/v1/metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetricsServiceRequest {
    /// Metrics grouped by resource.
    pub resource_metrics: Vec<ResourceMetrics>,
}

/// Metrics from one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    /// The producing resource.
    pub resource: Resource,
    /// Metrics grouped by instrumentation scope.
    pub scope_metrics: Vec<ScopeMetrics>,
}

/// Metrics from one instrumentation scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeMetrics {
    /// The producing scope.
    pub scope: InstrumentationScope,
    /// The metrics.
    pub metrics: Vec<OtlpMetric>,
}

/// One metric on the wire. Counters map to a monotonic cumulative sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpMetric {
    /// Metric name.
    pub name: String,
    /// Sum data (counters).
    pub sum: OtlpSum,
}

/// Sum aggregation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSum {
    /// One data point per label combination.
    pub data_points: Vec<NumberDataPoint>,
    /// Aggregation temporality (2 = cumulative).
    pub aggregation_temporality: i32,
    /// Whether the sum only increases.
    pub is_monotonic: bool,
}

/// One numeric data point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberDataPoint {
    /// Data point attributes (the label set).
    pub attributes: Vec<KeyValue>,
    /// Observation timestamp, nanoseconds since epoch.
    pub time_unix_nano: String,
    /// The value.
    pub as_double: f64,
}

/// Converts a `DateTime<Utc>` to the stringified nanosecond encoding.
fn datetime_to_unix_nano(dt: DateTime<Utc>) -> String {
    dt.timestamp_nanos_opt().unwrap_or(0).to_string()
}

/// Converts a `serde_json::Value` into an OTLP `AnyValue`.
fn json_to_any_value(value: &serde_json::Value) -> AnyValue {
    match value {
        serde_json::Value::String(s) => AnyValue {
            string_value: Some(s.clone()),
            ..AnyValue::default()
        },
        serde_json::Value::Bool(b) => AnyValue {
            bool_value: Some(*b),
            ..AnyValue::default()
        },
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AnyValue {
                    int_value: Some(i.to_string()),
                    ..AnyValue::default()
                }
            } else {
                AnyValue {
                    double_value: n.as_f64(),
                    ..AnyValue::default()
                }
            }
        }
        serde_json::Value::Array(items) => AnyValue {
            array_value: Some(ArrayValue {
                values: items.iter().map(json_to_any_value).collect(),
            }),
            ..AnyValue::default()
        },
        // Objects and nulls are flattened to their JSON text form.
        other => AnyValue {
            string_value: Some(other.to_string()),
            ..AnyValue::default()
        },
    }
}

/// Converts an attribute map into sorted OTLP key-value pairs.
fn attributes_to_key_values(
    attributes: &std::collections::HashMap<String, serde_json::Value>,
) -> Vec<KeyValue> {
    let sorted: BTreeMap<&String, &serde_json::Value> = attributes.iter().collect();
    sorted
        .into_iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: json_to_any_value(v),
        })
        .collect()
}

fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: AnyValue {
            string_value: Some(value.to_string()),
            ..AnyValue::default()
        },
    }
}

fn service_resource(service: &str) -> Resource {
    Resource {
        attributes: vec![string_attribute("service.name", service)],
    }
}

fn status_code(status: SpanStatus) -> i32 {
    match status {
        SpanStatus::Unset => 0,
        SpanStatus::Ok => 1,
        SpanStatus::Error => 2,
    }
}

fn span_to_otlp(span: &SpanData) -> OtlpSpan {
    let mut events: Vec<OtlpSpanEvent> = span
        .events
        .iter()
        .map(|event| OtlpSpanEvent {
            time_unix_nano: datetime_to_unix_nano(event.timestamp),
            name: event.name.clone(),
            attributes: attributes_to_key_values(&event.attributes),
        })
        .collect();

    // A recorded exception travels as the conventional `exception` event.
    if let Some(ref exception) = span.exception {
        let mut attributes = vec![string_attribute("exception.message", &exception.message)];
        if let Some(ref type_name) = exception.type_name {
            attributes.push(string_attribute("exception.type", type_name));
        }
        events.push(OtlpSpanEvent {
            time_unix_nano: datetime_to_unix_nano(span.end_time.unwrap_or(span.start_time)),
            name: "exception".to_string(),
            attributes,
        });
    }

    OtlpSpan {
        trace_id: span.trace_id.clone(),
        span_id: span.span_id.clone(),
        name: span.name.clone(),
        kind: SPAN_KIND_SERVER,
        start_time_unix_nano: datetime_to_unix_nano(span.start_time),
        end_time_unix_nano: datetime_to_unix_nano(span.end_time.unwrap_or(span.start_time)),
        attributes: attributes_to_key_values(&span.attributes),
        events,
        status: OtlpStatus {
            code: status_code(span.status),
            message: span.status_message.clone(),
        },
    }
}

/// Builds the trace export request for a batch of sealed spans.
///
/// Spans are grouped into one `ResourceSpans` per producing service.
#[must_use]
pub fn trace_request(spans: &[SpanData]) -> ExportTraceServiceRequest {
    let mut by_service: BTreeMap<&str, Vec<OtlpSpan>> = BTreeMap::new();
    for span in spans {
        by_service
            .entry(span.service.as_str())
            .or_default()
            .push(span_to_otlp(span));
    }

    ExportTraceServiceRequest {
        resource_spans: by_service
            .into_iter()
            .map(|(service, spans)| ResourceSpans {
                resource: service_resource(service),
                scope_spans: vec![ScopeSpans {
                    scope: InstrumentationScope {
                        name: service.to_string(),
                    },
                    spans,
                }],
            })
            .collect(),
    }
}

/// Builds the metric export request for a snapshot batch.
#[must_use]
pub fn metrics_request(service: &str, snapshots: &[CounterSnapshot]) -> ExportMetricsServiceRequest {
    let metrics: Vec<OtlpMetric> = snapshots
        .iter()
        .map(|snapshot| OtlpMetric {
            name: snapshot.name.clone(),
            sum: OtlpSum {
                data_points: snapshot
                    .points
                    .iter()
                    .map(|point| NumberDataPoint {
                        attributes: point
                            .labels
                            .iter()
                            .map(|(k, v)| string_attribute(k, v))
                            .collect(),
                        time_unix_nano: datetime_to_unix_nano(snapshot.collected_at),
                        as_double: point.value,
                    })
                    .collect(),
                aggregation_temporality: AGGREGATION_TEMPORALITY_CUMULATIVE,
                is_monotonic: true,
            },
        })
        .collect();

    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: service_resource(service),
            scope_metrics: vec![ScopeMetrics {
                scope: InstrumentationScope {
                    name: service.to_string(),
                },
                metrics,
            }],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CounterPoint, ExceptionRecord, SpanEvent};
    use chrono::Utc;
    use std::collections::HashMap;

    fn sealed_span(name: &str, status: SpanStatus) -> SpanData {
        let mut span = SpanData::new(
            "0af7651916cd43dd8448eb211c80319c",
            "b7ad6b7169203331",
            name,
            "product-service",
        );
        span.end_time = Some(span.start_time + chrono::Duration::milliseconds(5));
        span.status = status;
        span
    }

    #[test]
    fn test_trace_request_groups_by_service() {
        let mut other = sealed_span("GET /greet", SpanStatus::Ok);
        other.service = "edge".to_string();

        let request = trace_request(&[sealed_span("POST /createProduct", SpanStatus::Ok), other]);

        assert_eq!(request.resource_spans.len(), 2);
        let services: Vec<&str> = request
            .resource_spans
            .iter()
            .filter_map(|rs| rs.resource.attributes[0].value.string_value.as_deref())
            .collect();
        assert_eq!(services, vec!["edge", "product-service"]);
    }

    #[test]
    fn test_span_status_codes() {
        let request = trace_request(&[sealed_span("op", SpanStatus::Error)]);
        let span = &request.resource_spans[0].scope_spans[0].spans[0];
        assert_eq!(span.status.code, 2);

        let request = trace_request(&[sealed_span("op", SpanStatus::Ok)]);
        assert_eq!(request.resource_spans[0].scope_spans[0].spans[0].status.code, 1);
    }

    #[test]
    fn test_exception_becomes_event() {
        let mut span = sealed_span("POST /createProduct", SpanStatus::Error);
        span.exception = Some(ExceptionRecord {
            message: "connection reset".to_string(),
            type_name: Some("StoreError".to_string()),
        });

        let request = trace_request(&[span]);
        let events = &request.resource_spans[0].scope_spans[0].spans[0].events;
        let exception = events.iter().find(|e| e.name == "exception").unwrap();

        assert_eq!(
            exception.attributes[0].value.string_value.as_deref(),
            Some("connection reset")
        );
        assert_eq!(exception.attributes[1].key, "exception.type");
    }

    #[test]
    fn test_span_events_and_attributes_convert() {
        let mut span = sealed_span("POST /createProduct", SpanStatus::Ok);
        span.attributes
            .insert("product.price".to_string(), serde_json::json!(9.99));
        span.attributes
            .insert("product.name".to_string(), serde_json::json!("Desk Lamp"));
        span.events.push(SpanEvent {
            name: "Product saved to database".to_string(),
            timestamp: Utc::now(),
            attributes: HashMap::from([("count".to_string(), serde_json::json!(3))]),
        });

        let request = trace_request(&[span]);
        let otlp_span = &request.resource_spans[0].scope_spans[0].spans[0];

        // Attributes are sorted by key
        assert_eq!(otlp_span.attributes[0].key, "product.name");
        assert_eq!(
            otlp_span.attributes[1].value.double_value,
            Some(9.99)
        );
        assert_eq!(otlp_span.events[0].attributes[0].value.int_value.as_deref(), Some("3"));
    }

    #[test]
    fn test_timestamps_are_nano_strings() {
        let span = sealed_span("op", SpanStatus::Ok);
        let request = trace_request(&[span]);
        let otlp_span = &request.resource_spans[0].scope_spans[0].spans[0];

        let start: i64 = otlp_span.start_time_unix_nano.parse().unwrap();
        let end: i64 = otlp_span.end_time_unix_nano.parse().unwrap();
        assert!(end > start);
    }

    #[test]
    fn test_metrics_request_shape() {
        let snapshot = CounterSnapshot::new(
            "http_requests_total",
            vec![CounterPoint {
                labels: std::collections::BTreeMap::from([(
                    "route".to_string(),
                    "/getProduct".to_string(),
                )]),
                value: 12.0,
            }],
        );

        let request = metrics_request("product-service", &[snapshot]);
        let metric = &request.resource_metrics[0].scope_metrics[0].metrics[0];

        assert_eq!(metric.name, "http_requests_total");
        assert!(metric.sum.is_monotonic);
        assert_eq!(metric.sum.aggregation_temporality, 2);
        assert_eq!(metric.sum.data_points[0].as_double, 12.0);
        assert_eq!(metric.sum.data_points[0].attributes[0].key, "route");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = trace_request(&[sealed_span("op", SpanStatus::Ok)]);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"resourceSpans\""));
        assert!(json.contains("\"scopeSpans\""));
        assert!(json.contains("\"traceId\""));
        assert!(json.contains("\"startTimeUnixNano\""));
    }
}
