use serde::{Deserialize, Serialize};

use crate::crm::{Contact, Contribution, ContributionStatus, Payment};
use crate::order::Order;

/// Notifications emitted for downstream listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    ContactCreated {
        contact: Contact,
        order: Order,
    },
    /// An existing Contact was linked to the Order and its sub-types were extended.
    ContactUpdated {
        contact: Contact,
        order: Order,
    },
    ContributionCreated {
        contribution: Contribution,
        order: Order,
    },
    ContributionStatusUpdated {
        contribution: Contribution,
        order: Order,
        status: ContributionStatus,
    },
    PaymentRecorded {
        payment: Payment,
        order: Order,
    },
}

impl SyncEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::ContactCreated { .. } => "contact_created",
            SyncEvent::ContactUpdated { .. } => "contact_updated",
            SyncEvent::ContributionCreated { .. } => "contribution_created",
            SyncEvent::ContributionStatusUpdated { .. } => "contribution_status_updated",
            SyncEvent::PaymentRecorded { .. } => "payment_recorded",
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            SyncEvent::ContactCreated { order, .. }
            | SyncEvent::ContactUpdated { order, .. }
            | SyncEvent::ContributionCreated { order, .. }
            | SyncEvent::ContributionStatusUpdated { order, .. }
            | SyncEvent::PaymentRecorded { order, .. } => order,
        }
    }
}
