//! Order status transitions and their effect on Contributions.

mod mapping;
mod once;
mod synchronizer;

pub use mapping::{contribution_status_for, is_noop_transition};
pub use once::{OnceToken, SyncTrigger};
pub use synchronizer::{StatusSyncOutcome, StatusSynchronizer};
