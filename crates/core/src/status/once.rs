use std::collections::HashSet;
use std::fmt;

/// What started a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTrigger {
    OrderCreated,
    StatusChanged,
    CampaignChanged,
    SourceChanged,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::OrderCreated => "order_created",
            SyncTrigger::StatusChanged => "status_changed",
            SyncTrigger::CampaignChanged => "campaign_changed",
            SyncTrigger::SourceChanged => "source_changed",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped guard that lets each (Order, trigger) pair run once.
///
/// Create one per incoming event and pass it down the call chain; a
/// duplicate signal within the same request then becomes a no-op.
#[derive(Debug, Default)]
pub struct OnceToken {
    fired: HashSet<(u64, SyncTrigger)>,
}

impl OnceToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pair. Returns false if it was already claimed.
    pub fn claim(&mut self, order_id: u64, trigger: SyncTrigger) -> bool {
        self.fired.insert((order_id, trigger))
    }

    pub fn has_fired(&self, order_id: u64, trigger: SyncTrigger) -> bool {
        self.fired.contains(&(order_id, trigger))
    }
}
