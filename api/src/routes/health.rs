//! Health check endpoint.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Spans lost to telemetry queue overflow since startup.
    pub dropped_spans: u64,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check handler for load balancers and monitoring systems.
///
/// Also surfaces the span-queue overflow counter, the one loss the
/// best-effort telemetry boundary can otherwise hide.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "storelens-api",
        version: env!("CARGO_PKG_VERSION"),
        dropped_spans: state.telemetry().dropped_spans(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use telemetry::export::{CaptureMetricExporter, CaptureSpanExporter, MetricExport, SpanExport};
    use telemetry::{Logger, Telemetry, TelemetryConfig};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let (logger, _console) = Logger::with_capture_console("product-service");
        let telemetry = Arc::new(Telemetry::with_exporters(
            TelemetryConfig {
                export_interval: std::time::Duration::from_secs(3600),
                ..TelemetryConfig::default()
            },
            Arc::new(logger),
            Arc::new(CaptureSpanExporter::new()) as Arc<dyn SpanExport>,
            Arc::new(CaptureMetricExporter::new()) as Arc<dyn MetricExport>,
        ));
        AppState::with_in_memory_store(telemetry)
    }

    #[tokio::test]
    async fn test_health_check_status() {
        let app = health_routes(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_check_body() {
        let app = health_routes(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "storelens-api");
        assert!(health["version"].is_string());
        assert_eq!(health["dropped_spans"], 0);
    }
}
