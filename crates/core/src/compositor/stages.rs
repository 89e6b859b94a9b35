//! The fixed stage list that turns an Order item into a CRM line item.
//!
//! Stages run in the order returned by [`default_stages`]. Later stages rely
//! on fields set by earlier ones, so the order is not configurable. Stages
//! fail closed: missing data leaves the draft unchanged.

use rust_decimal::Decimal;
use tracing::debug;

use super::types::{DraftLineItem, StageContext, StageOutcome};
use crate::crm::{
    MembershipParams, ParticipantParams, ParticipantStatus, SubEntityParams,
    MEMBERSHIP_STATUS_PENDING,
};
use crate::order::EntityType;

/// One step of line item composition.
pub trait LineItemStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, draft: DraftLineItem, ctx: &StageContext<'_>) -> StageOutcome;
}

/// The stages, in execution order.
pub fn default_stages() -> Vec<Box<dyn LineItemStage>> {
    vec![
        Box::new(BaseMapping),
        Box::new(TaxAugmentation),
        Box::new(MembershipAugmentation),
        Box::new(ParticipantAugmentation),
        Box::new(VariantRedirect),
    ]
}

/// Amounts, label, price field and financial type from the item and its mapping.
pub struct BaseMapping;

impl LineItemStage for BaseMapping {
    fn name(&self) -> &'static str {
        "base"
    }

    fn apply(&self, mut draft: DraftLineItem, ctx: &StageContext<'_>) -> StageOutcome {
        if draft.mapping.entity_type == EntityType::Exclude {
            return StageOutcome::Skip("product is excluded".to_string());
        }

        let qty = Decimal::from(draft.item.quantity.max(1));
        if let Some(price_field_value) = ctx.price_field_value_for(&draft.mapping) {
            draft.line.price_field_id = Some(price_field_value.price_field_id);
            draft.line.price_field_value_id = Some(price_field_value.id);
        }
        draft.line.qty = qty;
        draft.line.line_total = draft.item.line_total;
        draft.line.unit_price = (draft.item.line_total / qty).round_dp(2);
        draft.line.tax_amount = Decimal::ZERO;
        draft.line.label = draft.item.name.clone();
        draft.line.financial_type_id = draft.mapping.financial_type_id;

        StageOutcome::Continue(draft)
    }
}

/// Tax of taxable products.
pub struct TaxAugmentation;

impl LineItemStage for TaxAugmentation {
    fn name(&self) -> &'static str {
        "tax"
    }

    fn apply(&self, mut draft: DraftLineItem, _ctx: &StageContext<'_>) -> StageOutcome {
        if draft.item.taxable {
            draft.line.tax_amount = draft.item.line_tax;
        }
        StageOutcome::Continue(draft)
    }
}

/// Pending membership for products carrying a membership type.
pub struct MembershipAugmentation;

impl LineItemStage for MembershipAugmentation {
    fn name(&self) -> &'static str {
        "membership"
    }

    fn apply(&self, mut draft: DraftLineItem, ctx: &StageContext<'_>) -> StageOutcome {
        if !draft.mapping.has_membership() {
            return StageOutcome::Continue(draft);
        }
        let Some(membership_type_id) = draft.mapping.membership_type_id else {
            return StageOutcome::Continue(draft);
        };

        debug!(
            item_id = draft.item.id,
            membership_type_id, "Attaching membership to line item"
        );
        draft.line.entity = Some(SubEntityParams::Membership(MembershipParams {
            contact_id: ctx.contact_id,
            membership_type_id,
            status: MEMBERSHIP_STATUS_PENDING.to_string(),
            financial_type_id: draft.line.financial_type_id,
            source: None,
        }));
        StageOutcome::Continue(draft)
    }
}

/// Pending event registration for products carrying an event and role.
pub struct ParticipantAugmentation;

impl LineItemStage for ParticipantAugmentation {
    fn name(&self) -> &'static str {
        "participant"
    }

    fn apply(&self, mut draft: DraftLineItem, ctx: &StageContext<'_>) -> StageOutcome {
        if !draft.mapping.has_participant() {
            return StageOutcome::Continue(draft);
        }
        let (Some(event_id), Some(role_id)) =
            (draft.mapping.event_id, draft.mapping.participant_role_id)
        else {
            return StageOutcome::Continue(draft);
        };

        let status = if ctx.is_pay_later() {
            ParticipantStatus::PendingFromPayLater
        } else {
            ParticipantStatus::PendingFromIncompleteTransaction
        };

        debug!(
            item_id = draft.item.id,
            event_id,
            status = status.name(),
            "Attaching participant to line item"
        );
        draft.line.entity = Some(SubEntityParams::Participant(ParticipantParams {
            contact_id: ctx.contact_id,
            event_id,
            role_id,
            status,
            source: format!("{}: {}", ctx.config.source, draft.item.name),
            fee_amount: draft.line.line_total + draft.line.tax_amount,
            fee_level: draft.item.name.clone(),
            register_date: ctx.order.created_date,
        }));
        StageOutcome::Continue(draft)
    }
}

/// Re-reads the mapping of custom-variant products from their variation.
pub struct VariantRedirect;

impl LineItemStage for VariantRedirect {
    fn name(&self) -> &'static str {
        "variant"
    }

    fn apply(&self, mut draft: DraftLineItem, ctx: &StageContext<'_>) -> StageOutcome {
        if draft.mapping.entity_type != EntityType::CustomVariant {
            return StageOutcome::Continue(draft);
        }
        let Some(variant) = draft
            .item
            .variation_id
            .and_then(|id| ctx.variation_mappings.get(&id))
        else {
            debug!(item_id = draft.item.id, "No variation mapping for custom-variant product");
            return StageOutcome::Continue(draft);
        };

        if variant.entity_type == EntityType::Exclude {
            return StageOutcome::Skip("variation is excluded".to_string());
        }

        if let Some(price_field_value) = ctx.price_field_value_for(variant) {
            draft.line.price_field_id = Some(price_field_value.price_field_id);
            draft.line.price_field_value_id = Some(price_field_value.id);
        }
        draft.line.financial_type_id = variant.financial_type_id;
        draft.line.entity = None;
        draft.mapping = variant.clone();

        match MembershipAugmentation.apply(draft, ctx) {
            StageOutcome::Continue(draft) => ParticipantAugmentation.apply(draft, ctx),
            skipped => skipped,
        }
    }
}
