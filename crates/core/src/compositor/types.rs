use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::config::ContributionConfig;
use crate::crm::{ContactId, LineItem, PriceFieldValue};
use crate::order::{Order, OrderItem, ProductMapping};

/// A line item on its way through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLineItem {
    pub item: OrderItem,
    /// Effective mapping. The variant stage may replace it.
    pub mapping: ProductMapping,
    pub line: LineItem,
}

impl DraftLineItem {
    pub fn new(item: OrderItem, mapping: ProductMapping) -> Self {
        let line = LineItem {
            price_field_id: None,
            price_field_value_id: None,
            unit_price: Decimal::ZERO,
            qty: Decimal::ZERO,
            line_total: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            financial_type_id: None,
            label: item.name.clone(),
            entity: None,
        };
        Self {
            item,
            mapping,
            line,
        }
    }
}

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Continue(DraftLineItem),
    /// Drop the item and stop its chain.
    Skip(String),
}

/// Read-only data every stage can see.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub order: &'a Order,
    pub contact_id: ContactId,
    pub config: &'a ContributionConfig,
    /// Only looked up when some line actually needs it.
    pub default_price_field_value: Option<&'a PriceFieldValue>,
    /// Price field values referenced by the Order's mappings, by id.
    pub price_field_values: &'a HashMap<u64, PriceFieldValue>,
    /// Variation mappings, by variation id.
    pub variation_mappings: &'a HashMap<u64, ProductMapping>,
}

impl<'a> StageContext<'a> {
    /// Price field value a mapping points at, or the default one.
    pub fn price_field_value_for(&self, mapping: &ProductMapping) -> Option<&'a PriceFieldValue> {
        mapping
            .price_field_value_id
            .and_then(|id| self.price_field_values.get(&id))
            .or(self.default_price_field_value)
    }

    pub fn is_pay_later(&self) -> bool {
        self.config.is_pay_later(&self.order.payment_method)
    }
}

/// Line items ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedLineItems {
    pub line_items: Vec<LineItem>,
    /// Contribution-level financial type.
    pub financial_type_id: u64,
}

impl ComposedLineItems {
    /// Amount the Contribution will be charged.
    pub fn total(&self) -> Decimal {
        self.line_items.iter().map(LineItem::charged_amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Items(ComposedLineItems),
    /// No syncable product in the Order.
    Empty,
}

impl Composition {
    pub fn is_empty(&self) -> bool {
        matches!(self, Composition::Empty)
    }
}
