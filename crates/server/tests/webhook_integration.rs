//! Order webhook integration tests.
//!
//! Drives the order endpoints through the router with a mock CRM:
//! - New orders create a contact and a contribution
//! - Repeated deliveries are idempotent
//! - Status, campaign and source changes reach the linked contribution
//! - CRM failures come back as notes with an error status
//! - Ingress key enforcement

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{order_json, TestConfig, TestFixture};
use crmsync_core::{CorrelationStore, CrmError};

#[tokio::test]
async fn test_sync_order_creates_contribution() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(1, "pending", &[(10, "25.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "synced");
    assert_eq!(response.body["trigger"], "order_created");

    let contribution_id = response.body["contribution_id"].as_u64().unwrap();
    let contact_id = response.body["contact_id"].as_u64().unwrap();
    assert_eq!(
        response.body["notes"],
        json!([
            format!("Contact {} linked", contact_id),
            format!("Contribution {} created", contribution_id),
        ])
    );

    let orders = fixture.crm.created_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].financial_type_id, 5);
    assert_eq!(orders[0].line_items[0].price_field_value_id, Some(3));

    let meta = fixture.correlation.get(1).unwrap();
    assert_eq!(meta.contribution_id, Some(contribution_id));
}

#[tokio::test]
async fn test_repeated_delivery_is_idempotent() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;
    let body = json!({ "order": order_json(2, "pending", &[(10, "25.00")]) });

    let first = fixture.post("/api/v1/orders/sync", body.clone()).await;
    let second = fixture.post("/api/v1/orders/sync", body).await;

    assert_status!(second, StatusCode::OK);
    assert_eq!(second.body["outcome"], "already_synced");
    assert_eq!(first.body["contribution_id"], second.body["contribution_id"]);
    assert_eq!(first.body["contact_id"], second.body["contact_id"]);
    assert_eq!(fixture.crm.call_count("Order.create").await, 1);
    assert_eq!(fixture.crm.contact_count().await, 1);
}

#[tokio::test]
async fn test_unmapped_products_are_not_synced() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(3, "pending", &[(99, "12.50")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "empty");
    assert_eq!(fixture.crm.call_count("Order.create").await, 0);
}

#[tokio::test]
async fn test_mapping_without_price_field_value_uses_default() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .put(
            "/api/v1/products/30/mapping",
            json!({ "entity_type": "contribution", "financial_type_id": 5 }),
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(13, "pending", &[(30, "12.50")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let orders = fixture.crm.created_orders().await;
    assert_eq!(orders[0].financial_type_id, 5);
    assert_eq!(orders[0].line_items[0].price_field_value_id, Some(1));
}

#[tokio::test]
async fn test_excluded_order_reports_empty() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .put(
            "/api/v1/products/20/mapping",
            json!({ "entity_type": "exclude" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(4, "pending", &[(20, "15.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "empty");
    assert!(response.body["contribution_id"].is_null());
    assert_eq!(fixture.crm.call_count("Order.create").await, 0);
}

#[tokio::test]
async fn test_zero_amount_order_is_skipped() {
    let fixture = TestFixture::with_config(TestConfig {
        ignore_zero_amount_orders: true,
        ..Default::default()
    })
    .await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(5, "completed", &[(10, "0.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "skipped_zero_amount");
    assert!(fixture.crm.calls().await.is_empty());
}

#[tokio::test]
async fn test_status_change_to_completed_records_payment() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;
    fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(6, "processing", &[(10, "40.00")]) }),
        )
        .await;

    let response = fixture
        .post(
            "/api/v1/orders/status",
            json!({
                "order": order_json(6, "completed", &[(10, "40.00")]),
                "old_status": "processing",
                "new_status": "completed",
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "payment");
    let payments = fixture.crm.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].total_amount, common::fixtures::money("40.00"));
}

#[tokio::test]
async fn test_status_change_within_pending_is_noop() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;
    fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(7, "pending", &[(10, "40.00")]) }),
        )
        .await;
    fixture.crm.clear_recorded().await;

    let response = fixture
        .post(
            "/api/v1/orders/status",
            json!({
                "order": order_json(7, "on-hold", &[(10, "40.00")]),
                "old_status": "pending",
                "new_status": "on-hold",
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "noop");
    assert!(fixture.crm.calls().await.is_empty());
}

#[tokio::test]
async fn test_campaign_and_source_changes() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;
    let order = order_json(8, "pending", &[(10, "10.00")]);

    let recorded = fixture
        .post(
            "/api/v1/orders/campaign",
            json!({ "order": order.clone(), "campaign_id": 4 }),
        )
        .await;
    assert_status!(recorded, StatusCode::OK);
    assert_eq!(recorded.body["outcome"], "recorded");

    fixture
        .post("/api/v1/orders/sync", json!({ "order": order.clone() }))
        .await;
    assert_eq!(fixture.crm.created_orders().await[0].campaign_id, Some(4));

    let updated = fixture
        .post(
            "/api/v1/orders/source",
            json!({ "order": order, "source": "Box office" }),
        )
        .await;
    assert_status!(updated, StatusCode::OK);
    assert_eq!(updated.body["outcome"], "updated");

    let correlation = fixture.get("/api/v1/orders/8/correlation").await;
    assert_status!(correlation, StatusCode::OK);
    assert_eq!(correlation.body["campaign_id"], 4);
    assert_eq!(correlation.body["source"], "Box office");
}

#[tokio::test]
async fn test_crm_failure_returns_note() {
    let fixture = TestFixture::new().await;
    fixture.map_product(10, 5, 3).await;
    fixture
        .crm
        .fail_on(
            "Order.create",
            CrmError::api("Order", "create", "Invalid financial type"),
        )
        .await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(9, "pending", &[(10, "10.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["kind"], "api");
    assert_eq!(
        response.body["note"],
        "CRM sync failed: Order.create failed: Invalid financial type"
    );
}

#[tokio::test]
async fn test_missing_default_price_field_value_is_a_conflict() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .put(
            "/api/v1/products/10/mapping",
            json!({ "entity_type": "contribution", "financial_type_id": 5 }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    fixture.crm.set_default_price_field_value(None).await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(10, "pending", &[(10, "10.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::CONFLICT);
    assert_eq!(response.body["kind"], "consistency");
}

#[tokio::test]
async fn test_unmapped_order_without_default_price_field_value_is_empty() {
    let fixture = TestFixture::new().await;
    fixture.crm.set_default_price_field_value(None).await;

    let response = fixture
        .post(
            "/api/v1/orders/sync",
            json!({ "order": order_json(14, "pending", &[(99, "10.00")]) }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "empty");
    assert_eq!(fixture.crm.call_count("Order.create").await, 0);
}

#[tokio::test]
async fn test_malformed_order_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/v1/orders/sync", "{\"order\": ").await;

    assert!(response.status.is_client_error());
    assert_eq!(fixture.crm.calls().await.len(), 0);
}

#[tokio::test]
async fn test_ingress_key_required_when_configured() {
    let fixture = TestFixture::with_config(TestConfig::with_ingress_key("hook-secret")).await;
    let body = json!({ "order": order_json(11, "pending", &[(10, "10.00")]) });

    let missing = fixture.post("/api/v1/orders/sync", body.clone()).await;
    assert_status!(missing, StatusCode::UNAUTHORIZED);

    let wrong = fixture
        .post_with_headers(
            "/api/v1/orders/sync",
            body.clone(),
            &[("Authorization", "Bearer nope")],
        )
        .await;
    assert_status!(wrong, StatusCode::UNAUTHORIZED);
    assert!(fixture.crm.calls().await.is_empty());

    let bearer = fixture
        .post_with_headers(
            "/api/v1/orders/sync",
            body.clone(),
            &[("Authorization", "Bearer hook-secret")],
        )
        .await;
    assert_status!(bearer, StatusCode::OK);

    let header = fixture
        .post_with_headers(
            "/api/v1/orders/sync",
            body,
            &[("X-API-Key", "hook-secret")],
        )
        .await;
    assert_status!(header, StatusCode::OK);
    assert_eq!(header.body["outcome"], "empty");
}

#[tokio::test]
async fn test_health_is_open_with_ingress_key() {
    let fixture = TestFixture::with_config(TestConfig::with_ingress_key("hook-secret")).await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}
