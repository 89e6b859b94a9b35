//! The order sync pipeline: contact, line items, contribution, status.

mod pipeline;
mod types;

pub use pipeline::OrderSync;
pub use types::{SyncOutcome, SyncReport};
