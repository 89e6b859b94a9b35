//! Order sync lifecycle integration tests.
//!
//! These tests drive the full pipeline against the mock CRM and a SQLite
//! correlation store:
//! - Single and mixed financial type orders
//! - Idempotent re-runs with fresh once-tokens
//! - Line item sums matching the order total
//! - Excluded products and zero-amount orders
//! - Status transitions and payments

use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;

use crmsync_core::{
    config::ContributionConfig,
    create_event_channel,
    crm::{ContributionStatus, SubEntityParams, MEMBERSHIP_STATUS_PENDING},
    testing::{fixtures, MemoryProductCatalog, MockCrmClient},
    CorrelationStore, OnceToken, Order, OrderStatus, OrderSync, ProductMapping,
    SqliteCorrelationStore, StatusSyncOutcome, SyncEventEnvelope, SyncOutcome,
};

const DONATION: u64 = 10;
const MEMBERSHIP: u64 = 11;
const MUG: u64 = 12;
const GIFT_CARD: u64 = 13;

/// Test helper wiring the pipeline to mocks and an on-disk correlation store.
struct TestHarness {
    sync: OrderSync,
    crm: Arc<MockCrmClient>,
    correlation: Arc<SqliteCorrelationStore>,
    events: Receiver<SyncEventEnvelope>,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(fixtures::contribution_config()).await
    }

    async fn with_config(config: ContributionConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let correlation = Arc::new(
            SqliteCorrelationStore::new(&temp_dir.path().join("crmsync.db"))
                .expect("Failed to create correlation store"),
        );

        let crm = Arc::new(MockCrmClient::new());
        crm.add_price_field_value(fixtures::price_field_value(3, 2, Some(5)))
            .await;
        crm.add_price_field_value(fixtures::price_field_value(8, 4, Some(2)))
            .await;
        crm.add_price_field_value(fixtures::price_field_value(9, 5, Some(1)))
            .await;

        let catalog = MemoryProductCatalog::new()
            .with_product(DONATION, ProductMapping::contribution(5, 3))
            .with_product(MEMBERSHIP, ProductMapping::membership(2, 8, 7))
            .with_product(MUG, ProductMapping::contribution(1, 9))
            .with_product(GIFT_CARD, ProductMapping::excluded());

        let (handle, events) = create_event_channel(128);
        let sync = OrderSync::new(
            crm.clone(),
            Arc::new(catalog),
            correlation.clone(),
            handle,
            fixtures::contact_config(),
            config,
        );

        Self {
            sync,
            crm,
            correlation,
            events,
            _temp_dir: temp_dir,
        }
    }

    async fn create(&self, order: &Order) -> crmsync_core::SyncReport {
        self.sync
            .on_order_created(order, &mut OnceToken::new())
            .await
            .expect("Order sync failed")
    }

    fn drain_event_types(&mut self) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Ok(envelope) = self.events.try_recv() {
            types.push(envelope.event.event_type());
        }
        types
    }
}

fn donation_order(id: u64) -> Order {
    fixtures::order(id, vec![fixtures::order_item(1, DONATION, "Donation", "25.00")])
}

#[tokio::test]
async fn test_single_donation_order() {
    let mut h = TestHarness::new().await;

    let report = h.create(&donation_order(1)).await;
    assert_eq!(report.outcome, SyncOutcome::Synced);

    let orders = h.crm.created_orders().await;
    assert_eq!(orders.len(), 1);
    let params = &orders[0];
    assert_eq!(params.financial_type_id, 5);
    assert_eq!(params.line_items.len(), 1);

    let line = &params.line_items[0];
    assert_eq!(line.price_field_value_id, Some(3));
    assert_eq!(line.unit_price, fixtures::money("25.00"));
    assert_eq!(line.line_total, fixtures::money("25.00"));
    assert_eq!(line.financial_type_id, Some(5));
    assert_eq!(params.trxn_id, "Order - 1");
    assert_eq!(params.contribution_status_id, ContributionStatus::Pending.id());

    let events = h.drain_event_types();
    assert!(events.contains(&"contact_created"));
    assert!(events.contains(&"contribution_created"));
}

#[tokio::test]
async fn test_mixed_financial_types_fall_back_to_default() {
    let h = TestHarness::new().await;
    let order = fixtures::order(
        2,
        vec![
            fixtures::order_item(1, MEMBERSHIP, "Annual membership", "50.00"),
            fixtures::order_item(2, DONATION, "Donation", "10.00"),
        ],
    );

    h.create(&order).await;

    let params = &h.crm.created_orders().await[0];
    assert_eq!(params.line_items.len(), 2);
    assert_eq!(params.financial_type_id, 1);

    let membership = params
        .line_items
        .iter()
        .find_map(|l| match &l.entity {
            Some(SubEntityParams::Membership(m)) => Some(m),
            _ => None,
        })
        .expect("membership line item");
    assert_eq!(membership.membership_type_id, 7);
    assert_eq!(membership.status, MEMBERSHIP_STATUS_PENDING);
}

#[tokio::test]
async fn test_zero_amount_order_is_ignored() {
    let mut config = fixtures::contribution_config();
    config.ignore_zero_amount_orders = true;
    let h = TestHarness::with_config(config).await;

    let mut order = fixtures::order(3, vec![fixtures::order_item(1, DONATION, "Donation", "0")]);
    order.total = Decimal::ZERO;

    let report = h.create(&order).await;

    assert_eq!(report.outcome, SyncOutcome::SkippedZeroAmount);
    assert_eq!(h.crm.call_count("Order.create").await, 0);
    assert_eq!(h.crm.call_count("Payment.create").await, 0);
    assert!(!h.correlation.get(3).unwrap().is_synced());
}

#[tokio::test]
async fn test_processing_to_completed_records_payment() {
    let h = TestHarness::new().await;
    let mut order = donation_order(4);
    order.status = OrderStatus::Processing;
    h.create(&order).await;

    let order = fixtures::paid(order);
    let report = h
        .sync
        .on_status_changed(
            &order,
            OrderStatus::Processing,
            OrderStatus::Completed,
            &mut OnceToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        SyncOutcome::Status(StatusSyncOutcome::PaymentRecorded { .. })
    ));
    let payments = h.crm.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].total_amount, order.total);

    let contribution_id = report.contribution_id.unwrap();
    let stored = h.crm.contribution(contribution_id).await.unwrap();
    assert_eq!(stored.status(), Some(ContributionStatus::Completed));
}

#[tokio::test]
async fn test_pending_to_on_hold_makes_no_remote_call() {
    let h = TestHarness::new().await;
    let order = donation_order(5);
    h.create(&order).await;
    h.crm.clear_recorded().await;

    let report = h
        .sync
        .on_status_changed(
            &order,
            OrderStatus::Pending,
            OrderStatus::OnHold,
            &mut OnceToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Status(StatusSyncOutcome::NoOp));
    assert!(h.crm.calls().await.is_empty());
}

#[tokio::test]
async fn test_statuses_sharing_a_crm_status_never_write() {
    let h = TestHarness::new().await;
    let order = donation_order(6);
    h.create(&order).await;
    h.crm.clear_recorded().await;

    let pending_like = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::OnHold,
    ];
    for old in pending_like {
        for new in pending_like {
            h.sync
                .on_status_changed(&order, old, new, &mut OnceToken::new())
                .await
                .unwrap();
        }
    }

    assert_eq!(h.crm.write_count().await, 0);
}

#[tokio::test]
async fn test_cancelled_order_updates_status_without_amounts() {
    let h = TestHarness::new().await;
    let mut order = donation_order(7);
    h.create(&order).await;

    order.status = OrderStatus::Cancelled;
    let report = h
        .sync
        .on_status_changed(
            &order,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            &mut OnceToken::new(),
        )
        .await
        .unwrap();

    let contribution_id = report.contribution_id.unwrap();
    assert_eq!(
        report.notes,
        vec![format!(
            "Contribution {} status set to Cancelled",
            contribution_id
        )]
    );

    let update = h
        .crm
        .calls()
        .await
        .into_iter()
        .find(|c| c.operation == "Contribution.update")
        .expect("contribution update call");
    assert!(update.params.get("total_amount").is_none());
    assert!(update.params.get("net_amount").is_none());
    assert_eq!(h.crm.payments().await.len(), 0);
}

#[tokio::test]
async fn test_rerun_reuses_contact_and_contribution() {
    let h = TestHarness::new().await;
    let order = donation_order(8);

    let first = h.create(&order).await;
    let second = h.create(&order).await;

    assert_eq!(first.outcome, SyncOutcome::Synced);
    assert_eq!(second.outcome, SyncOutcome::AlreadySynced);
    assert_eq!(first.contact_id, second.contact_id);
    assert_eq!(first.contribution_id, second.contribution_id);
    assert_eq!(h.crm.contact_count().await, 1);
    assert_eq!(h.crm.call_count("Order.create").await, 1);
}

#[tokio::test]
async fn test_second_order_from_same_customer_reuses_contact() {
    let h = TestHarness::new().await;

    let first = h.create(&donation_order(9)).await;
    h.crm.set_duplicates(vec![first.contact_id.unwrap()]).await;
    let second = h.create(&donation_order(10)).await;

    assert_eq!(first.contact_id, second.contact_id);
    assert_ne!(first.contribution_id, second.contribution_id);
    assert_eq!(h.crm.contact_count().await, 1);
}

#[tokio::test]
async fn test_line_items_sum_to_order_total() {
    let mut config = fixtures::contribution_config();
    config.shipping_financial_type_id = Some(6);
    let h = TestHarness::with_config(config).await;

    let order = fixtures::with_shipping(
        fixtures::order(
            11,
            vec![
                fixtures::taxed_item(1, MUG, "Mug", "12.00", "2.40"),
                fixtures::order_item(2, DONATION, "Donation", "30.00"),
                fixtures::order_item(3, MEMBERSHIP, "Annual membership", "50.00"),
            ],
        ),
        "4.95",
    );

    h.create(&order).await;

    let params = &h.crm.created_orders().await[0];
    let sum: Decimal = params.line_items.iter().map(|l| l.charged_amount()).sum();
    assert_eq!(sum, order.total);
    assert_eq!(params.line_items.len(), 4);

    let contribution_id = h.correlation.get(11).unwrap().contribution_id.unwrap();
    let stored = h.crm.contribution(contribution_id).await.unwrap();
    assert_eq!(stored.total_amount, Some(order.total));
}

#[tokio::test]
async fn test_excluded_products_never_reach_the_crm() {
    let h = TestHarness::new().await;
    let order = fixtures::order(
        12,
        vec![
            fixtures::order_item(1, GIFT_CARD, "Gift card", "20.00"),
            fixtures::order_item(2, DONATION, "Donation", "5.00"),
        ],
    );

    h.create(&order).await;

    let params = &h.crm.created_orders().await[0];
    assert_eq!(params.line_items.len(), 1);
    assert_eq!(params.line_items[0].price_field_value_id, Some(3));
}

#[tokio::test]
async fn test_all_excluded_creates_no_contribution() {
    let h = TestHarness::new().await;
    let order = fixtures::order(
        13,
        vec![fixtures::order_item(1, GIFT_CARD, "Gift card", "20.00")],
    );

    let report = h.create(&order).await;

    assert_eq!(report.outcome, SyncOutcome::Empty);
    assert_eq!(h.crm.call_count("Order.create").await, 0);
    assert_eq!(h.correlation.get(13).unwrap().contribution_id, None);
}

#[tokio::test]
async fn test_failed_submission_can_be_retried() {
    let h = TestHarness::new().await;
    let order = donation_order(14);
    h.crm
        .fail_on(
            "Order.create",
            crmsync_core::CrmError::api("Order", "create", "DB Error: deadlock"),
        )
        .await;

    let err = h
        .sync
        .on_order_created(&order, &mut OnceToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "api");
    assert!(err.order_note().contains("deadlock"));

    let meta = h.correlation.get(14).unwrap();
    assert!(meta.contact_id.is_some());
    assert_eq!(meta.contribution_id, None);

    h.crm.clear_failures().await;
    let report = h.create(&order).await;

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert_eq!(report.contact_id, meta.contact_id);
    assert_eq!(h.crm.contact_count().await, 1);
}

#[tokio::test]
async fn test_correlation_survives_reopening_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("crmsync.db");

    {
        let store = SqliteCorrelationStore::new(&path).unwrap();
        assert!(store
            .set_if_absent(15, crmsync_core::CorrelationField::ContactId, "100")
            .unwrap());
    }

    let store = SqliteCorrelationStore::new(&path).unwrap();
    assert_eq!(store.get(15).unwrap().contact_id, Some(100));
}
