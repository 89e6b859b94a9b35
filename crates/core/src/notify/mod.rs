//! Notifications for listeners outside the pipeline.

mod events;
mod handle;

pub use events::SyncEvent;
pub use handle::{create_event_channel, SyncEventEnvelope, SyncEventHandle};
