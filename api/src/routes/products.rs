//! Product creation and listing endpoints.
//!
//! Each handler opens one span for the operation, annotates it, and seals
//! it on every exit path; validation failures and store errors become
//! error-status spans plus a JSON error response, never a crash.

use crate::state::AppState;
use crate::store::{Product, ProductInput};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use telemetry::models::SpanStatus;
use validator::Validate;

/// Response for a created product.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The created product.
    pub data: Product,
}

/// Response for a product listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductListResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The stored products, most recent first.
    pub data: Vec<Product>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Always false.
    pub success: bool,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    fn new(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// Creates the product routes.
pub fn product_routes(state: AppState) -> Router {
    Router::new()
        .route("/createProduct", post(create_product))
        .route("/getProduct", get(get_products))
        .with_state(state)
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductResponse>), (StatusCode, Json<ApiError>)> {
    state
        .requests()
        .add(1.0, &[("method", "POST"), ("route", "/createProduct")]);
    let mut span = state.tracer().start_span("POST /createProduct");

    if input.validate().is_err() {
        span.set_status(SpanStatus::Error, "Validation failed");
        span.end();
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("Please provide all fields")),
        ));
    }

    // Validation guarantees the fields are present.
    let name = input.name.unwrap_or_default();
    let price = input.price.unwrap_or_default();
    let image = input.image.unwrap_or_default();

    span.set_attribute("product.name", &name);
    span.set_attribute("product.price", price);
    span.set_attribute("product.image", &image);

    let product = Product::new(name, price, image);

    match state.store().insert(product.clone()) {
        Ok(()) => {
            span.add_event(
                "Product saved to database",
                [("product_id", serde_json::json!(product.id))],
            );
            span.set_status(SpanStatus::Ok, "Product created successfully");
            span.end();

            state.logger().info(format!(
                "New product added: Name: {}, Price: {}, Image URL: {}",
                product.name, product.price, product.image
            ));

            Ok((
                StatusCode::CREATED,
                Json(ProductResponse {
                    success: true,
                    data: product,
                }),
            ))
        }
        Err(e) => {
            span.record_exception(&e);
            span.set_status(SpanStatus::Error, "Server error");
            span.end();

            state
                .logger()
                .error(format!("Error in Create Product: {e}"));

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new("Server Error")),
            ))
        }
    }
}

async fn get_products(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ProductListResponse>), (StatusCode, Json<ApiError>)> {
    state
        .requests()
        .add(1.0, &[("method", "GET"), ("route", "/getProduct")]);
    let mut span = state.tracer().start_span("GET /getProduct");

    match state.store().list() {
        Ok(products) => {
            span.add_event(
                "Fetched products from database",
                [("count", serde_json::json!(products.len()))],
            );
            span.set_status(SpanStatus::Ok, "Fetched products successfully");
            span.end();

            state
                .logger()
                .info(format!("Fetched {} products successfully.", products.len()));

            Ok((
                StatusCode::OK,
                Json(ProductListResponse {
                    success: true,
                    data: products,
                }),
            ))
        }
        Err(e) => {
            span.record_exception(&e);
            span.set_status(SpanStatus::Error, "Server error");
            span.end();

            state
                .logger()
                .error(format!("Error in fetching products: {e}"));

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new("Server Error")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ProductStore, StoreError};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use telemetry::export::{
        CaptureMetricExporter, CaptureSpanExporter, MetricExport, SpanExport,
    };
    use telemetry::{Logger, Telemetry, TelemetryConfig};
    use tower::ServiceExt;

    fn capture_state(store: Arc<dyn ProductStore>) -> (AppState, Arc<CaptureSpanExporter>) {
        let spans = Arc::new(CaptureSpanExporter::new());
        let (logger, _console) = Logger::with_capture_console("product-service");
        let telemetry = Arc::new(Telemetry::with_exporters(
            TelemetryConfig {
                export_interval: Duration::from_secs(3600),
                ..TelemetryConfig::default()
            },
            Arc::new(logger),
            Arc::clone(&spans) as Arc<dyn SpanExport>,
            Arc::new(CaptureMetricExporter::new()) as Arc<dyn MetricExport>,
        ));
        (AppState::new(store, telemetry), spans)
    }

    fn in_memory_state() -> (AppState, Arc<CaptureSpanExporter>) {
        capture_state(crate::store::InMemoryProductStore::new_shared())
    }

    async fn post_product(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/createProduct")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_product_missing_price_returns_400() {
        let (state, spans) = in_memory_state();
        let app = product_routes(state.clone());

        let (status, body) = post_product(
            app,
            r#"{"name": "Desk Lamp", "image": "https://img.example/lamp.png"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Please provide all fields");
        assert_eq!(state.store().count().unwrap(), 0);

        state.telemetry().shutdown(Duration::from_secs(1)).await;
        let exported = spans.spans();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, telemetry::models::SpanStatus::Error);
        // Validation failure is not an exception.
        assert!(exported[0].exception.is_none());
    }

    #[tokio::test]
    async fn test_create_product_returns_201_with_record() {
        let (state, spans) = in_memory_state();
        let app = product_routes(state.clone());

        let (status, body) = post_product(
            app,
            r#"{"name": "Desk Lamp", "price": 24.99, "image": "https://img.example/lamp.png"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "Desk Lamp");
        assert_eq!(body["data"]["price"], 24.99);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(state.store().count().unwrap(), 1);

        state.telemetry().shutdown(Duration::from_secs(1)).await;
        let exported = spans.spans();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, telemetry::models::SpanStatus::Ok);
        assert_eq!(
            exported[0].attributes.get("product.name"),
            Some(&serde_json::json!("Desk Lamp"))
        );
        // The save event carries the new record's identifier.
        let event = &exported[0].events[0];
        assert_eq!(event.name, "Product saved to database");
        assert_eq!(event.attributes.get("product_id"), Some(&serde_json::json!(id)));
    }

    #[tokio::test]
    async fn test_get_products_empty_store() {
        let (state, spans) = in_memory_state();
        let app = product_routes(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getProduct")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([]));

        state.telemetry().shutdown(Duration::from_secs(1)).await;
        let exported = spans.spans();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, telemetry::models::SpanStatus::Ok);
        assert_eq!(
            exported[0].events[0].attributes.get("count"),
            Some(&serde_json::json!(0))
        );
    }

    struct FailingStore;

    impl ProductStore for FailingStore {
        fn insert(&self, _product: Product) -> Result<(), StoreError> {
            Err(StoreError::StorageError("connection reset".to_string()))
        }
        fn list(&self) -> Result<Vec<Product>, StoreError> {
            Err(StoreError::StorageError("connection reset".to_string()))
        }
        fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_create_product_store_failure_returns_500() {
        let (state, spans) = capture_state(Arc::new(FailingStore));
        let app = product_routes(state.clone());

        let (status, body) = post_product(
            app,
            r#"{"name": "Desk Lamp", "price": 24.99, "image": "lamp.png"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Server Error");

        state.telemetry().shutdown(Duration::from_secs(1)).await;
        let exported = spans.spans();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, telemetry::models::SpanStatus::Error);
        // Store failures record the exception detail on the span.
        let exception = exported[0].exception.as_ref().unwrap();
        assert!(exception.message.contains("connection reset"));
        assert_eq!(exception.type_name.as_deref(), Some("StoreError"));
    }

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let (state, _spans) = in_memory_state();
        let app = product_routes(state.clone());

        let (status, _) = post_product(
            app.clone(),
            r#"{"name": "Desk Lamp", "price": 24.99, "image": "lamp.png"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getProduct")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ProductListResponse = serde_json::from_slice(&bytes).unwrap();

        assert!(body.success);
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].name, "Desk Lamp");
    }

    #[tokio::test]
    async fn test_request_counter_labels() {
        let (state, _spans) = in_memory_state();
        let app = product_routes(state.clone());

        let _ = post_product(
            app.clone(),
            r#"{"name": "A", "price": 1.0, "image": "a.png"}"#,
        )
        .await;
        let _ = app
            .oneshot(
                Request::builder()
                    .uri("/getProduct")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let snapshot = state.telemetry().meter().snapshot();
        assert_eq!(snapshot[0].name, "http_requests_total");
        assert_eq!(snapshot[0].total(), 2.0);
        assert_eq!(snapshot[0].points.len(), 2);
    }
}
