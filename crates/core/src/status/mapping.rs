//! Commerce status to CRM contribution status table.

use crate::crm::ContributionStatus;
use crate::order::OrderStatus;

/// CRM status an Order status maps onto. Several Order statuses share one.
pub fn contribution_status_for(status: OrderStatus) -> ContributionStatus {
    match status {
        OrderStatus::Pending | OrderStatus::Processing | OrderStatus::OnHold => {
            ContributionStatus::Pending
        }
        OrderStatus::Completed => ContributionStatus::Completed,
        OrderStatus::Cancelled => ContributionStatus::Cancelled,
        OrderStatus::Refunded => ContributionStatus::Refunded,
        OrderStatus::Failed => ContributionStatus::Failed,
    }
}

/// Whether moving between two Order statuses leaves the CRM untouched.
pub fn is_noop_transition(old: OrderStatus, new: OrderStatus) -> bool {
    old == new || contribution_status_for(old) == contribution_status_for(new)
}
