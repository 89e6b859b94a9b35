use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::mapping::{contribution_status_for, is_noop_transition};
use super::once::{OnceToken, SyncTrigger};
use crate::config::ContributionConfig;
use crate::correlation::CorrelationStore;
use crate::crm::{ContributionId, ContributionStatus, CrmClient, PaymentParams};
use crate::error::SyncError;
use crate::metrics::STATUS_TRANSITIONS;
use crate::notify::{SyncEvent, SyncEventHandle};
use crate::order::{Order, OrderStatus};

/// What a status change did on the CRM side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSyncOutcome {
    /// Both statuses map to the same CRM status.
    NoOp,
    /// Already handled for this Order within the current request.
    AlreadyHandled,
    /// The Order has no Contribution yet.
    NotLinked,
    /// Zero-amount order with zero-amount orders ignored.
    SkippedZeroAmount,
    PaymentRecorded {
        contribution_id: ContributionId,
        payment_id: u64,
    },
    StatusUpdated {
        contribution_id: ContributionId,
        status: ContributionStatus,
    },
}

impl StatusSyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSyncOutcome::NoOp => "noop",
            StatusSyncOutcome::AlreadyHandled => "already_handled",
            StatusSyncOutcome::NotLinked => "not_linked",
            StatusSyncOutcome::SkippedZeroAmount => "skipped_zero_amount",
            StatusSyncOutcome::PaymentRecorded { .. } => "payment",
            StatusSyncOutcome::StatusUpdated { .. } => "updated",
        }
    }
}

/// Applies Order status transitions to the linked Contribution.
pub struct StatusSynchronizer {
    crm: Arc<dyn CrmClient>,
    correlation: Arc<dyn CorrelationStore>,
    events: SyncEventHandle,
    config: ContributionConfig,
}

impl StatusSynchronizer {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        correlation: Arc<dyn CorrelationStore>,
        events: SyncEventHandle,
        config: ContributionConfig,
    ) -> Self {
        Self {
            crm,
            correlation,
            events,
            config,
        }
    }

    /// Apply the transition `old -> new` of `order`.
    ///
    /// A paid transition to Completed records a Payment; every other
    /// transition rewrites the Contribution status. On failure the
    /// Contribution is left as it was.
    pub async fn sync(
        &self,
        order: &Order,
        old: OrderStatus,
        new: OrderStatus,
        token: &mut OnceToken,
    ) -> Result<StatusSyncOutcome, SyncError> {
        let result = self.transition(order, old, new, token).await;
        let label = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "failed",
        };
        STATUS_TRANSITIONS.with_label_values(&[label]).inc();
        result
    }

    async fn transition(
        &self,
        order: &Order,
        old: OrderStatus,
        new: OrderStatus,
        token: &mut OnceToken,
    ) -> Result<StatusSyncOutcome, SyncError> {
        if is_noop_transition(old, new) {
            debug!(order_id = order.id, %old, %new, "Status change maps to the same CRM status");
            return Ok(StatusSyncOutcome::NoOp);
        }
        if !token.claim(order.id, SyncTrigger::StatusChanged) {
            debug!(order_id = order.id, "Status change already handled in this request");
            return Ok(StatusSyncOutcome::AlreadyHandled);
        }

        let Some(contribution_id) = self.correlation.get(order.id)?.contribution_id else {
            debug!(order_id = order.id, "No contribution linked, status change ignored");
            return Ok(StatusSyncOutcome::NotLinked);
        };

        let target = contribution_status_for(new);
        if target == ContributionStatus::Completed && order.is_paid() {
            if order.is_zero_amount() && self.config.ignore_zero_amount_orders {
                debug!(order_id = order.id, "Zero-amount order, payment skipped");
                return Ok(StatusSyncOutcome::SkippedZeroAmount);
            }
            return self.record_payment(order, contribution_id).await;
        }

        self.update_status(order, contribution_id, target).await
    }

    async fn record_payment(
        &self,
        order: &Order,
        contribution_id: ContributionId,
    ) -> Result<StatusSyncOutcome, SyncError> {
        let params = PaymentParams {
            contribution_id,
            total_amount: order.total,
            trxn_date: order.paid_date.unwrap_or_else(Utc::now),
            trxn_id: order.trxn_id(),
            payment_instrument_id: self.config.payment_instrument_for(&order.payment_method),
        };

        let payment = self.crm.create_payment(&params).await.map_err(|e| {
            error!(
                method = "Payment.create",
                params = ?params,
                result = %e,
                order_id = order.id,
                "Failed to record payment"
            );
            e
        })?;

        info!(
            order_id = order.id,
            contribution_id,
            payment_id = payment.id,
            amount = %payment.total_amount,
            "Payment recorded"
        );
        let payment_id = payment.id;
        self.events.try_emit(SyncEvent::PaymentRecorded {
            payment,
            order: order.clone(),
        });

        Ok(StatusSyncOutcome::PaymentRecorded {
            contribution_id,
            payment_id,
        })
    }

    async fn update_status(
        &self,
        order: &Order,
        contribution_id: ContributionId,
        status: ContributionStatus,
    ) -> Result<StatusSyncOutcome, SyncError> {
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
        contribution.contribution_status_id = status.id();

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
                    "Failed to update contribution status"
                );
                e
            })?;

        info!(
            order_id = order.id,
            contribution_id,
            status = status.as_str(),
            "Contribution status updated"
        );
        self.events.try_emit(SyncEvent::ContributionStatusUpdated {
            contribution: updated,
            order: order.clone(),
            status,
        });

        Ok(StatusSyncOutcome::StatusUpdated {
            contribution_id,
            status,
        })
    }
}
