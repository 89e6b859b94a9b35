//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router with a mock CRM
//! and SQLite stores in a temp directory, enabling end-to-end webhook tests
//! without a real CRM.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crmsync_core::{
    create_event_channel, load_config_from_str, testing::MockCrmClient, CorrelationStore,
    OrderSync, ProductCatalog, SqliteCorrelationStore, SqliteProductCatalog, SyncEventEnvelope,
};
use tokio::sync::mpsc::Receiver;

/// Re-export fixtures for test convenience
pub use crmsync_core::testing::fixtures;

/// Test fixture for API testing with a mock CRM.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_order_sync() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/orders/sync", json!({ "order": order })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock CRM - configure lookups and inspect calls
    pub crm: Arc<MockCrmClient>,
    /// Product mappings, shared with the router
    pub catalog: Arc<SqliteProductCatalog>,
    /// Correlation meta, shared with the router
    pub correlation: Arc<SqliteCorrelationStore>,
    /// Sync events emitted while handling requests
    pub events: Receiver<SyncEventEnvelope>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture without an ingress key.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let ingress = match &test_config.ingress_api_key {
            Some(key) => format!("[ingress]\napi_key = \"{}\"\n", key),
            None => String::new(),
        };
        let config = load_config_from_str(&format!(
            r#"
[crm]
url = "http://crm.invalid/civicrm/ajax/rest"
api_key = "crm-secret"
site_key = "site-secret"

[contribution]
default_financial_type_id = 1
ignore_zero_amount_orders = {}

[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

{}
"#,
            test_config.ignore_zero_amount_orders,
            db_path.display(),
            ingress
        ))
        .expect("Failed to parse test config");

        let crm = Arc::new(MockCrmClient::new());
        crm.add_price_field_value(fixtures::price_field_value(3, 2, Some(5)))
            .await;

        let catalog = Arc::new(
            SqliteProductCatalog::new(&db_path).expect("Failed to create product catalog"),
        );
        let correlation = Arc::new(
            SqliteCorrelationStore::new(&db_path).expect("Failed to create correlation store"),
        );

        let (event_handle, events) = create_event_channel(100);
        let sync = OrderSync::new(
            Arc::clone(&crm) as Arc<dyn crmsync_core::CrmClient>,
            Arc::clone(&catalog) as Arc<dyn ProductCatalog>,
            Arc::clone(&correlation) as Arc<dyn CorrelationStore>,
            event_handle,
            config.contact.clone(),
            config.contribution.clone(),
        );

        let state = Arc::new(crmsync_server::state::AppState::new(
            config,
            sync,
            Arc::clone(&catalog) as Arc<dyn ProductCatalog>,
            Arc::clone(&correlation) as Arc<dyn CorrelationStore>,
        ));

        let router = crmsync_server::api::create_router(state);

        Self {
            router,
            crm,
            catalog,
            correlation,
            events,
            temp_dir,
        }
    }

    /// Store a contribution mapping for a product through the API.
    pub async fn map_product(&self, product_id: u64, financial_type_id: u64, pfv_id: u64) {
        let response = self
            .put(
                &format!("/api/v1/products/{}/mapping", product_id),
                json!({
                    "entity_type": "contribution",
                    "financial_type_id": financial_type_id,
                    "price_field_value_id": pfv_id,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a POST request with JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request("POST", path, Some(body), headers).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), &[]).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Key webhook callers must present
    pub ingress_api_key: Option<String>,
    /// Skip zero-amount orders
    pub ignore_zero_amount_orders: bool,
}

impl TestConfig {
    /// Create config with an ingress key.
    pub fn with_ingress_key(key: &str) -> Self {
        Self {
            ingress_api_key: Some(key.to_string()),
            ..Default::default()
        }
    }
}

/// JSON for an order with one item per `(product_id, line_total)` pair.
pub fn order_json(id: u64, status: &str, items: &[(u64, &str)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, (product_id, line_total))| {
            json!({
                "id": i as u64 + 1,
                "product_id": product_id,
                "name": format!("Product {}", product_id),
                "quantity": 1,
                "line_total": line_total,
            })
        })
        .collect();
    let total: rust_decimal::Decimal = items
        .iter()
        .map(|item| fixtures::money(item["line_total"].as_str().unwrap()))
        .sum();

    json!({
        "id": id,
        "billing": {
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.org",
        },
        "items": items,
        "total": total.to_string(),
        "currency": "USD",
        "payment_method": "stripe",
        "status": status,
        "paid": status == "completed",
        "created_date": "2024-03-01T10:00:00Z",
    })
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
