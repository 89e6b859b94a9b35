use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::stages::{default_stages, LineItemStage};
use super::types::{ComposedLineItems, Composition, DraftLineItem, StageContext, StageOutcome};
use crate::config::ContributionConfig;
use crate::crm::{ContactId, LineItem, LookupCache, PriceFieldValue};
use crate::error::SyncError;
use crate::metrics::LINE_ITEMS_SKIPPED;
use crate::order::{EntityType, MappingNamespace, Order, ProductCatalog, ProductMapping};

/// Label of the synthetic shipping line item.
pub const SHIPPING_LABEL: &str = "Shipping";

/// Turns Order items into CRM line items.
pub struct LineItemCompositor {
    cache: Arc<LookupCache>,
    catalog: Arc<dyn ProductCatalog>,
    config: ContributionConfig,
    stages: Vec<Box<dyn LineItemStage>>,
}

impl LineItemCompositor {
    pub fn new(
        cache: Arc<LookupCache>,
        catalog: Arc<dyn ProductCatalog>,
        config: ContributionConfig,
    ) -> Self {
        Self {
            cache,
            catalog,
            config,
            stages: default_stages(),
        }
    }

    /// Compose the line items of an Order for the given contact.
    ///
    /// Returns [`Composition::Empty`] when no item survives the stages. The
    /// default price field value is only looked up when a surviving line or
    /// the shipping line has no price field value of its own; a missing
    /// default is then a consistency error.
    pub async fn compose(
        &self,
        order: &Order,
        contact_id: ContactId,
    ) -> Result<Composition, SyncError> {
        let mut drafts = Vec::with_capacity(order.items.len());
        let mut variation_mappings = HashMap::new();
        for item in &order.items {
            let mapping = self.catalog.product_mapping(item.product_id)?;
            if mapping.entity_type == EntityType::CustomVariant {
                if let Some(variation_id) = item.variation_id {
                    if let Some(variant) =
                        self.catalog.mapping(MappingNamespace::Variation, variation_id)?
                    {
                        variation_mappings.insert(variation_id, variant);
                    }
                }
            }
            drafts.push(DraftLineItem::new(item.clone(), mapping));
        }

        let candidates: Vec<&ProductMapping> = drafts
            .iter()
            .filter_map(|d| effective_mapping(d, &variation_mappings))
            .filter(|m| m.entity_type.is_syncable())
            .collect();
        if candidates.is_empty() {
            debug!(order_id = order.id, "No syncable product in order");
            for draft in &drafts {
                let reason = match draft.mapping.entity_type {
                    EntityType::Exclude => "base",
                    _ => "unresolved",
                };
                LINE_ITEMS_SKIPPED.with_label_values(&[reason]).inc();
            }
            return Ok(Composition::Empty);
        }

        let price_field_values = self.price_field_values(candidates.iter().copied()).await?;
        let needs_default = self.ships(order)
            || candidates.iter().any(|m| {
                m.price_field_value_id
                    .and_then(|id| price_field_values.get(&id))
                    .is_none()
            });
        let default_price_field_value = if needs_default {
            Some(self.default_price_field_value().await?)
        } else {
            None
        };

        let ctx = StageContext {
            order,
            contact_id,
            config: &self.config,
            default_price_field_value: default_price_field_value.as_ref(),
            price_field_values: &price_field_values,
            variation_mappings: &variation_mappings,
        };

        let lines: Vec<LineItem> = drafts
            .into_iter()
            .filter_map(|draft| self.run_stages(draft, &ctx))
            .collect();

        if lines.is_empty() {
            debug!(order_id = order.id, "No syncable line items");
            return Ok(Composition::Empty);
        }

        let mut composed = self.aggregate(lines);
        if let Some(shipping) = self.shipping_line(order, default_price_field_value.as_ref()) {
            composed.line_items.push(shipping);
        }

        debug!(
            order_id = order.id,
            line_items = composed.line_items.len(),
            financial_type_id = composed.financial_type_id,
            total = %composed.total(),
            "Line items composed"
        );
        Ok(Composition::Items(composed))
    }

    fn run_stages(&self, mut draft: DraftLineItem, ctx: &StageContext<'_>) -> Option<LineItem> {
        let item_id = draft.item.id;
        for stage in &self.stages {
            match stage.apply(draft, ctx) {
                StageOutcome::Continue(next) => draft = next,
                StageOutcome::Skip(reason) => {
                    debug!(item_id, stage = stage.name(), reason = %reason, "Line item skipped");
                    LINE_ITEMS_SKIPPED.with_label_values(&[stage.name()]).inc();
                    return None;
                }
            }
        }

        if !draft.mapping.entity_type.is_syncable() {
            debug!(
                item_id,
                entity_type = %draft.mapping.entity_type,
                "Line item has no resolved entity type"
            );
            LINE_ITEMS_SKIPPED.with_label_values(&["unresolved"]).inc();
            return None;
        }
        if draft.line.price_field_value_id.is_none() {
            warn!(item_id, "Line item has no price field value");
            LINE_ITEMS_SKIPPED.with_label_values(&["price_field"]).inc();
            return None;
        }

        Some(draft.line)
    }

    /// Pick the Contribution-level financial type and fill in inherited ones.
    fn aggregate(&self, mut lines: Vec<LineItem>) -> ComposedLineItems {
        let default = self.config.default_financial_type_id;
        let types: BTreeSet<u64> = lines
            .iter()
            .map(|l| l.financial_type_id.unwrap_or(default))
            .collect();

        let financial_type_id = if types.len() == 1 {
            types.into_iter().next().unwrap_or(default)
        } else {
            debug!(types = ?types, "Mixed financial types, using default");
            default
        };

        for line in &mut lines {
            line.financial_type_id.get_or_insert(financial_type_id);
        }

        ComposedLineItems {
            line_items: lines,
            financial_type_id,
        }
    }

    /// Whether the Order gets a shipping line.
    fn ships(&self, order: &Order) -> bool {
        order.shipping_total > Decimal::ZERO && self.config.shipping_financial_type_id.is_some()
    }

    fn shipping_line(
        &self,
        order: &Order,
        price_field_value: Option<&PriceFieldValue>,
    ) -> Option<LineItem> {
        if order.shipping_total <= Decimal::ZERO {
            return None;
        }
        let Some(financial_type_id) = self.config.shipping_financial_type_id else {
            warn!(
                order_id = order.id,
                shipping_total = %order.shipping_total,
                "No shipping financial type configured, shipping not synced"
            );
            return None;
        };
        let price_field_value = price_field_value?;

        Some(LineItem {
            price_field_id: Some(price_field_value.price_field_id),
            price_field_value_id: Some(price_field_value.id),
            unit_price: order.shipping_total,
            qty: Decimal::ONE,
            line_total: order.shipping_total,
            tax_amount: order.shipping_tax,
            financial_type_id: Some(financial_type_id),
            label: SHIPPING_LABEL.to_string(),
            entity: None,
        })
    }

    async fn default_price_field_value(&self) -> Result<PriceFieldValue, SyncError> {
        let value = match self.config.default_price_field_value_id {
            Some(id) => self.cache.price_field_value(id).await?,
            None => self.cache.default_price_field_value().await?,
        };
        value.ok_or_else(|| {
            SyncError::Consistency("no default contribution price field value found".to_string())
        })
    }

    async fn price_field_values<'m>(
        &self,
        mappings: impl Iterator<Item = &'m ProductMapping>,
    ) -> Result<HashMap<u64, PriceFieldValue>, SyncError> {
        let ids: BTreeSet<u64> = mappings.filter_map(|m| m.price_field_value_id).collect();

        let mut values = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.cache.price_field_value(id).await? {
                Some(value) => {
                    values.insert(id, value);
                }
                None => warn!(price_field_value_id = id, "Price field value not found"),
            }
        }
        Ok(values)
    }
}

/// Mapping the stages will end up using for a draft.
fn effective_mapping<'m>(
    draft: &'m DraftLineItem,
    variation_mappings: &'m HashMap<u64, ProductMapping>,
) -> Option<&'m ProductMapping> {
    if draft.mapping.entity_type == EntityType::CustomVariant {
        draft
            .item
            .variation_id
            .and_then(|id| variation_mappings.get(&id))
    } else {
        Some(&draft.mapping)
    }
}
