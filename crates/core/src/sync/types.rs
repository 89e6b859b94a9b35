use crate::crm::{ContactId, ContributionId};
use crate::status::{StatusSyncOutcome, SyncTrigger};

/// Result of handling one Order event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A Contribution was created.
    Synced,
    /// The Order already has a Contribution.
    AlreadySynced,
    /// Already handled for this Order within the current request.
    AlreadyHandled,
    /// Zero-amount order with zero-amount orders ignored.
    SkippedZeroAmount,
    /// No syncable product in the Order.
    Empty,
    Status(StatusSyncOutcome),
    /// The linked Contribution was updated.
    Updated,
    /// Stored for the Order; used once its Contribution is created.
    Recorded,
    /// The value did not change.
    Unchanged,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Synced => "synced",
            SyncOutcome::AlreadySynced => "already_synced",
            SyncOutcome::AlreadyHandled => "already_handled",
            SyncOutcome::SkippedZeroAmount => "skipped_zero_amount",
            SyncOutcome::Empty => "empty",
            SyncOutcome::Status(status) => status.as_str(),
            SyncOutcome::Updated => "updated",
            SyncOutcome::Recorded => "recorded",
            SyncOutcome::Unchanged => "unchanged",
        }
    }
}

/// What happened for an Order, with the notes to attach to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub order_id: u64,
    pub trigger: SyncTrigger,
    pub outcome: SyncOutcome,
    pub contact_id: Option<ContactId>,
    pub contribution_id: Option<ContributionId>,
    pub notes: Vec<String>,
}

impl SyncReport {
    pub fn new(order_id: u64, trigger: SyncTrigger, outcome: SyncOutcome) -> Self {
        Self {
            order_id,
            trigger,
            outcome,
            contact_id: None,
            contribution_id: None,
            notes: Vec::new(),
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}
