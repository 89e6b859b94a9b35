use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::types::{SyncOutcome, SyncReport};
use crate::compositor::LineItemCompositor;
use crate::config::{ContactConfig, ContributionConfig};
use crate::contact::{ContactResolution, ContactResolver};
use crate::correlation::{CorrelationField, CorrelationStore};
use crate::crm::{Contribution, ContributionId, ContributionStatus, CrmClient, LookupCache};
use crate::error::SyncError;
use crate::metrics::{ORDER_SYNCS, ORDER_SYNC_DURATION};
use crate::notify::SyncEventHandle;
use crate::order::{Order, OrderStatus, ProductCatalog};
use crate::status::{
    contribution_status_for, OnceToken, StatusSyncOutcome, StatusSynchronizer, SyncTrigger,
};
use crate::submitter::{OrderSubmitter, SubmitOutcome};

/// Drives an Order through contact resolution, composition, submission and
/// status synchronization.
///
/// Each call handles one Order event to completion. Remote calls are made one
/// after another and never retried; the correlation store makes a repeated
/// call safe.
pub struct OrderSync {
    crm: Arc<dyn CrmClient>,
    correlation: Arc<dyn CorrelationStore>,
    cache: Arc<LookupCache>,
    resolver: ContactResolver,
    compositor: LineItemCompositor,
    submitter: OrderSubmitter,
    status: StatusSynchronizer,
    config: ContributionConfig,
}

impl OrderSync {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        catalog: Arc<dyn ProductCatalog>,
        correlation: Arc<dyn CorrelationStore>,
        events: SyncEventHandle,
        contact: ContactConfig,
        contribution: ContributionConfig,
    ) -> Self {
        let cache = Arc::new(LookupCache::new(crm.clone()));
        Self {
            resolver: ContactResolver::new(
                crm.clone(),
                cache.clone(),
                correlation.clone(),
                events.clone(),
                contact,
            ),
            compositor: LineItemCompositor::new(cache.clone(), catalog, contribution.clone()),
            submitter: OrderSubmitter::new(
                crm.clone(),
                cache.clone(),
                correlation.clone(),
                events.clone(),
                contribution.clone(),
            ),
            status: StatusSynchronizer::new(
                crm.clone(),
                correlation.clone(),
                events,
                contribution.clone(),
            ),
            crm,
            correlation,
            cache,
            config: contribution,
        }
    }

    /// Lookup cache shared by every stage of the pipeline.
    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    /// Sync a new or newly processed Order.
    pub async fn on_order_created(
        &self,
        order: &Order,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let result = self.sync_order(order, token).await;
        record(SyncTrigger::OrderCreated, start, &result);
        result
    }

    /// Apply an Order status change.
    pub async fn on_status_changed(
        &self,
        order: &Order,
        old: OrderStatus,
        new: OrderStatus,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let result = self.sync_status(order, old, new, token).await;
        record(SyncTrigger::StatusChanged, start, &result);
        result
    }

    /// Apply a campaign change. `None` removes the campaign.
    pub async fn on_campaign_changed(
        &self,
        order: &Order,
        campaign_id: Option<u64>,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let result = self.sync_campaign(order, campaign_id, token).await;
        record(SyncTrigger::CampaignChanged, start, &result);
        result
    }

    /// Apply a source change. A blank source removes it.
    pub async fn on_source_changed(
        &self,
        order: &Order,
        source: &str,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let result = self.sync_source(order, source, token).await;
        record(SyncTrigger::SourceChanged, start, &result);
        result
    }

    async fn sync_order(
        &self,
        order: &Order,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let trigger = SyncTrigger::OrderCreated;
        if !token.claim(order.id, trigger) {
            return Ok(SyncReport::new(order.id, trigger, SyncOutcome::AlreadyHandled));
        }

        if self.config.ignore_zero_amount_orders && order.is_zero_amount() {
            info!(order_id = order.id, "Zero-amount order ignored");
            return Ok(SyncReport::new(
                order.id,
                trigger,
                SyncOutcome::SkippedZeroAmount,
            ));
        }

        let meta = self.correlation.get(order.id)?;
        if let Some(contribution_id) = meta.contribution_id {
            let mut report = SyncReport::new(order.id, trigger, SyncOutcome::AlreadySynced);
            report.contact_id = meta.contact_id;
            report.contribution_id = Some(contribution_id);
            return Ok(report);
        }

        let contact = self.resolver.resolve(order).await?;
        let mut report = SyncReport::new(order.id, trigger, SyncOutcome::Empty);
        report.contact_id = Some(contact.contact_id);
        if contact.resolution != ContactResolution::Linked {
            report.note(format!("Contact {} linked", contact.contact_id));
        }

        let composition = self.compositor.compose(order, contact.contact_id).await?;
        let contribution = match self
            .submitter
            .submit(contact.contact_id, &composition, order)
            .await?
        {
            SubmitOutcome::Created(contribution) => contribution,
            SubmitOutcome::Superseded(contribution_id) => {
                report.outcome = SyncOutcome::AlreadySynced;
                report.contribution_id = Some(contribution_id);
                report.note(format!("Contribution {} already linked", contribution_id));
                return Ok(report);
            }
            SubmitOutcome::Empty => {
                info!(order_id = order.id, "No syncable products, no contribution created");
                return Ok(report);
            }
        };

        report.outcome = SyncOutcome::Synced;
        report.contribution_id = Some(contribution.id);
        report.note(format!("Contribution {} created", contribution.id));

        self.reconcile_initial_status(order, &contribution, token, &mut report)
            .await;

        Ok(report)
    }

    /// Bring a fresh Contribution up to the Order's current status.
    ///
    /// Failures are reported as notes; the Contribution itself was created.
    async fn reconcile_initial_status(
        &self,
        order: &Order,
        contribution: &Contribution,
        token: &mut OnceToken,
        report: &mut SyncReport,
    ) {
        if contribution_status_for(order.status) == ContributionStatus::Pending {
            return;
        }

        match self
            .status
            .sync(order, OrderStatus::Pending, order.status, token)
            .await
        {
            Ok(outcome) => {
                if let Some(note) = status_note(&outcome) {
                    report.note(note);
                }
            }
            Err(e) => {
                warn!(
                    order_id = order.id,
                    contribution_id = contribution.id,
                    error = %e,
                    "Initial status sync failed"
                );
                report.note(e.order_note());
            }
        }
    }

    async fn sync_status(
        &self,
        order: &Order,
        old: OrderStatus,
        new: OrderStatus,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let outcome = self.status.sync(order, old, new, token).await?;

        let mut report = SyncReport::new(
            order.id,
            SyncTrigger::StatusChanged,
            SyncOutcome::Status(outcome.clone()),
        );
        if let Some(note) = status_note(&outcome) {
            report.note(note);
        }
        let meta = self.correlation.get(order.id)?;
        report.contact_id = meta.contact_id;
        report.contribution_id = meta.contribution_id;
        Ok(report)
    }

    async fn sync_campaign(
        &self,
        order: &Order,
        campaign_id: Option<u64>,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let trigger = SyncTrigger::CampaignChanged;
        if !token.claim(order.id, trigger) {
            return Ok(SyncReport::new(order.id, trigger, SyncOutcome::AlreadyHandled));
        }

        let meta = self.correlation.get(order.id)?;
        let mut report = SyncReport::new(order.id, trigger, SyncOutcome::Unchanged);
        report.contact_id = meta.contact_id;
        report.contribution_id = meta.contribution_id;
        if meta.campaign_id == campaign_id {
            return Ok(report);
        }

        if let Some(contribution_id) = meta.contribution_id {
            self.update_contribution(order, contribution_id, |c| c.campaign_id = campaign_id)
                .await?;
            report.outcome = SyncOutcome::Updated;
            report.note(format!("Contribution {} campaign updated", contribution_id));
        } else {
            report.outcome = SyncOutcome::Recorded;
        }

        match campaign_id {
            Some(id) => self
                .correlation
                .update(order.id, CorrelationField::CampaignId, &id.to_string())?,
            None => {
                self.correlation.clear(order.id, CorrelationField::CampaignId)?;
            }
        }

        Ok(report)
    }

    async fn sync_source(
        &self,
        order: &Order,
        source: &str,
        token: &mut OnceToken,
    ) -> Result<SyncReport, SyncError> {
        let trigger = SyncTrigger::SourceChanged;
        if !token.claim(order.id, trigger) {
            return Ok(SyncReport::new(order.id, trigger, SyncOutcome::AlreadyHandled));
        }

        let source = Some(source.trim().to_string()).filter(|s| !s.is_empty());
        let meta = self.correlation.get(order.id)?;
        let mut report = SyncReport::new(order.id, trigger, SyncOutcome::Unchanged);
        report.contact_id = meta.contact_id;
        report.contribution_id = meta.contribution_id;
        if meta.source == source {
            return Ok(report);
        }

        if let Some(contribution_id) = meta.contribution_id {
            let new_source = source.clone();
            self.update_contribution(order, contribution_id, move |c| c.source = new_source)
                .await?;
            report.outcome = SyncOutcome::Updated;
            report.note(format!("Contribution {} source updated", contribution_id));
        } else {
            report.outcome = SyncOutcome::Recorded;
        }

        match &source {
            Some(source) => self
                .correlation
                .update(order.id, CorrelationField::Source, source)?,
            None => {
                self.correlation.clear(order.id, CorrelationField::Source)?;
            }
        }

        Ok(report)
    }

    async fn update_contribution(
        &self,
        order: &Order,
        contribution_id: ContributionId,
        apply: impl FnOnce(&mut Contribution) + Send,
    ) -> Result<Contribution, SyncError> {
        let mut contribution = self
            .crm
            .get_contribution(contribution_id)
            .await?
            .ok_or_else(|| {
                SyncError::Consistency(format!(
                    "linked contribution {} no longer exists",
                    contribution_id
                ))
            })?;

        contribution.strip_computed_amounts();
        apply(&mut contribution);

        let updated = self
            .crm
            .update_contribution(&contribution)
            .await
            .map_err(|e| {
                error!(
                    method = "Contribution.update",
                    params = ?contribution,
                    result = %e,
                    order_id = order.id,
                    "Failed to update contribution"
                );
                e
            })?;
        Ok(updated)
    }
}

fn status_note(outcome: &StatusSyncOutcome) -> Option<String> {
    match outcome {
        StatusSyncOutcome::PaymentRecorded {
            contribution_id, ..
        } => Some(format!("Payment recorded for Contribution {}", contribution_id)),
        StatusSyncOutcome::StatusUpdated {
            contribution_id,
            status,
        } => Some(format!(
            "Contribution {} status set to {}",
            contribution_id,
            status.as_str()
        )),
        _ => None,
    }
}

fn record(trigger: SyncTrigger, start: Instant, result: &Result<SyncReport, SyncError>) {
    let outcome = match result {
        Ok(report) => report.outcome.as_str(),
        Err(e) => {
            warn!(trigger = %trigger, kind = e.kind(), error = %e, "Order sync failed");
            "failed"
        }
    };
    ORDER_SYNCS
        .with_label_values(&[trigger.as_str(), outcome])
        .inc();
    ORDER_SYNC_DURATION
        .with_label_values(&[trigger.as_str()])
        .observe(start.elapsed().as_secs_f64());
}
