//! Testing utilities and mock implementations.
//!
//! This module provides a mock CRM and an in-memory product catalog, allowing
//! the whole sync pipeline to be exercised without a real CRM.
//!
//! # Example
//!
//! ```rust,ignore
//! use crmsync_core::testing::{fixtures, MemoryProductCatalog, MockCrmClient};
//!
//! let crm = MockCrmClient::new();
//! let catalog = MemoryProductCatalog::new()
//!     .with_product(10, ProductMapping::contribution(5, 3));
//!
//! let order = fixtures::order(1, vec![fixtures::order_item(1, 10, "Donation", "25.00")]);
//! ```

mod memory_catalog;
mod mock_crm;

pub use memory_catalog::MemoryProductCatalog;
pub use mock_crm::{MockCrmClient, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use crate::config::{ContactConfig, ContributionConfig};
    use crate::crm::{LineItem, OrderCreateParams, PriceFieldValue};
    use crate::order::{BillingDetails, Order, OrderItem, OrderStatus};

    /// Parse a money literal such as "25.00".
    pub fn money(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    /// Create an untaxed order item with quantity 1.
    pub fn order_item(id: u64, product_id: u64, name: &str, line_total: &str) -> OrderItem {
        OrderItem {
            id,
            product_id,
            variation_id: None,
            name: name.to_string(),
            quantity: 1,
            line_total: money(line_total),
            line_tax: Decimal::ZERO,
            taxable: false,
        }
    }

    /// Create a taxable order item with quantity 1.
    pub fn taxed_item(
        id: u64,
        product_id: u64,
        name: &str,
        line_total: &str,
        line_tax: &str,
    ) -> OrderItem {
        OrderItem {
            line_tax: money(line_tax),
            taxable: true,
            ..order_item(id, product_id, name, line_total)
        }
    }

    /// Create a pending order whose total is the sum of its items (tax included).
    pub fn order(id: u64, items: Vec<OrderItem>) -> Order {
        let total = items.iter().map(|i| i.line_total + i.line_tax).sum();
        Order {
            id,
            number: None,
            customer_user_id: None,
            billing: BillingDetails {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.org".to_string(),
            },
            items,
            shipping_total: Decimal::ZERO,
            shipping_tax: Decimal::ZERO,
            total,
            currency: "USD".to_string(),
            payment_method: "stripe".to_string(),
            status: OrderStatus::Pending,
            paid: false,
            paid_date: None,
            created_date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    /// Add shipping to an order and raise its total accordingly.
    pub fn with_shipping(mut order: Order, shipping_total: &str) -> Order {
        order.shipping_total = money(shipping_total);
        order.total += order.shipping_total;
        order
    }

    /// Mark an order completed and paid.
    pub fn paid(mut order: Order) -> Order {
        order.status = OrderStatus::Completed;
        order.paid = true;
        order.paid_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap());
        order
    }

    pub fn price_field_value(
        id: u64,
        price_field_id: u64,
        financial_type_id: Option<u64>,
    ) -> PriceFieldValue {
        PriceFieldValue {
            id,
            price_field_id,
            label: format!("Option {}", id),
            amount: Decimal::ONE,
            financial_type_id,
        }
    }

    pub fn line_item(
        price_field_value_id: u64,
        line_total: &str,
        financial_type_id: Option<u64>,
    ) -> LineItem {
        LineItem {
            price_field_id: Some(1),
            price_field_value_id: Some(price_field_value_id),
            unit_price: money(line_total),
            qty: Decimal::ONE,
            line_total: money(line_total),
            tax_amount: Decimal::ZERO,
            financial_type_id,
            label: format!("Item {}", price_field_value_id),
            entity: None,
        }
    }

    pub fn order_create_params(contact_id: u64, line_items: Vec<LineItem>) -> OrderCreateParams {
        OrderCreateParams {
            contact_id,
            financial_type_id: 1,
            line_items,
            receive_date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            trxn_id: "Order - 1".to_string(),
            invoice_id: "1_order".to_string(),
            contribution_status_id: 2,
            is_pay_later: false,
            currency: "USD".to_string(),
            source: None,
            campaign_id: None,
            payment_instrument_id: None,
        }
    }

    /// Contribution settings with financial type 1 as default.
    pub fn contribution_config() -> ContributionConfig {
        ContributionConfig::with_default_financial_type(1)
    }

    pub fn contact_config() -> ContactConfig {
        ContactConfig::default()
    }
}
