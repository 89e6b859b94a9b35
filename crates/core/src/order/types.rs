//! Commerce-side order data as delivered by the shop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status on the commerce side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The shop prefixes statuses with "wc-" in some payloads.
        let status = s.trim().trim_start_matches("wc-");
        match status {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on-hold" => Ok(OrderStatus::OnHold),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Billing details used for contact matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// One purchased line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub product_id: u64,
    /// Set when the purchased product is a variation of `product_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<u64>,
    pub name: String,
    pub quantity: u32,
    /// Line total excluding tax.
    pub line_total: Decimal,
    #[serde(default)]
    pub line_tax: Decimal,
    /// Whether the product is taxable.
    #[serde(default)]
    pub taxable: bool,
}

/// A commerce order. Read-only to the sync pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    /// Shop-facing order number, when it differs from the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Account of the logged-in customer that placed the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_user_id: Option<u64>,
    #[serde(default)]
    pub billing: BillingDetails,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_total: Decimal,
    #[serde(default)]
    pub shipping_tax: Decimal,
    pub total: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub payment_method: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
    pub created_date: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.paid
    }

    /// Date the contribution is received: paid date if known, else creation date.
    pub fn receive_date(&self) -> DateTime<Utc> {
        self.paid_date.unwrap_or(self.created_date)
    }

    /// Transaction id shared by the contribution and its payments.
    pub fn trxn_id(&self) -> String {
        format!("Order - {}", self.id)
    }

    pub fn invoice_id(&self) -> String {
        match &self.number {
            Some(number) if !number.is_empty() => number.clone(),
            _ => format!("{}_order", self.id),
        }
    }

    /// Order number for display, falling back to the id.
    pub fn display_number(&self) -> String {
        match &self.number {
            Some(number) if !number.is_empty() => number.clone(),
            _ => self.id.to_string(),
        }
    }

    pub fn is_zero_amount(&self) -> bool {
        self.total.is_zero()
    }
}
