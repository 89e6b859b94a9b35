use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::compositor::{ComposedLineItems, Composition};
use crate::config::ContributionConfig;
use crate::correlation::{CorrelationField, CorrelationMeta, CorrelationStore};
use crate::crm::{
    ContactId, Contribution, ContributionId, ContributionStatus, CrmClient, LookupCache,
    OrderCreateParams,
};
use crate::error::SyncError;
use crate::metrics::{CONTRIBUTIONS_CREATED, LINE_ITEMS_COMPOSED};
use crate::notify::{SyncEvent, SyncEventHandle};
use crate::order::Order;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Contribution),
    /// A concurrent run linked another Contribution first; carries its id.
    Superseded(ContributionId),
    /// Nothing to submit; no remote call was made.
    Empty,
}

/// Creates the Contribution of an Order.
pub struct OrderSubmitter {
    crm: Arc<dyn CrmClient>,
    cache: Arc<LookupCache>,
    correlation: Arc<dyn CorrelationStore>,
    events: SyncEventHandle,
    config: ContributionConfig,
}

impl OrderSubmitter {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        cache: Arc<LookupCache>,
        correlation: Arc<dyn CorrelationStore>,
        events: SyncEventHandle,
        config: ContributionConfig,
    ) -> Self {
        Self {
            crm,
            cache,
            correlation,
            events,
            config,
        }
    }

    /// Submit composed line items as one Order.create call.
    ///
    /// Nothing is retried. The new contribution id is stored for the Order
    /// only if none is stored yet.
    pub async fn submit(
        &self,
        contact_id: ContactId,
        composition: &Composition,
        order: &Order,
    ) -> Result<SubmitOutcome, SyncError> {
        let composed = match composition {
            Composition::Items(composed) if !composed.line_items.is_empty() => composed,
            _ => return Ok(SubmitOutcome::Empty),
        };

        self.validate_financial_types(composed).await?;

        let meta = self.correlation.get(order.id)?;
        let params = self.order_params(contact_id, composed, order, &meta);

        let contribution = self.crm.create_order(&params).await.map_err(|e| {
            error!(
                method = "Order.create",
                params = ?params,
                result = %e,
                order_id = order.id,
                "Failed to create contribution"
            );
            e
        })?;

        let written = self.correlation.set_if_absent(
            order.id,
            CorrelationField::ContributionId,
            &contribution.id.to_string(),
        )?;

        CONTRIBUTIONS_CREATED.inc();
        LINE_ITEMS_COMPOSED.observe(composed.line_items.len() as f64);

        if !written {
            if let Some(stored) = self.correlation.get(order.id)?.contribution_id {
                warn!(
                    order_id = order.id,
                    contribution_id = contribution.id,
                    stored_contribution_id = stored,
                    "Order already linked to another contribution, keeping the stored one"
                );
                return Ok(SubmitOutcome::Superseded(stored));
            }
        }

        info!(
            order_id = order.id,
            contact_id,
            contribution_id = contribution.id,
            "Contribution created"
        );
        self.events.try_emit(SyncEvent::ContributionCreated {
            contribution: contribution.clone(),
            order: order.clone(),
        });

        Ok(SubmitOutcome::Created(contribution))
    }

    /// Parameters of the Order.create call. No total is sent; the CRM sums the lines.
    pub fn order_params(
        &self,
        contact_id: ContactId,
        composed: &ComposedLineItems,
        order: &Order,
        meta: &CorrelationMeta,
    ) -> OrderCreateParams {
        let source = meta
            .source
            .clone()
            .unwrap_or_else(|| format!("{} Order #{}", self.config.source, order.display_number()));

        OrderCreateParams {
            contact_id,
            financial_type_id: composed.financial_type_id,
            line_items: composed.line_items.clone(),
            receive_date: order.receive_date(),
            trxn_id: order.trxn_id(),
            invoice_id: order.invoice_id(),
            contribution_status_id: ContributionStatus::Pending.id(),
            is_pay_later: self.config.is_pay_later(&order.payment_method),
            currency: order.currency.clone(),
            source: Some(source),
            campaign_id: meta.campaign_id.or(self.config.campaign_id),
            payment_instrument_id: self.config.payment_instrument_for(&order.payment_method),
        }
    }

    async fn validate_financial_types(&self, composed: &ComposedLineItems) -> Result<(), SyncError> {
        let ids: BTreeSet<u64> = std::iter::once(composed.financial_type_id)
            .chain(composed.line_items.iter().filter_map(|l| l.financial_type_id))
            .collect();

        for id in ids {
            if !self.cache.is_active_financial_type(id).await? {
                return Err(SyncError::Validation(format!(
                    "financial type {} is not an active CRM financial type",
                    id
                )));
            }
        }
        Ok(())
    }
}
