use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::SyncEvent;

/// Envelope wrapping a sync event with metadata
#[derive(Debug, Clone)]
pub struct SyncEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: SyncEvent,
}

/// Create a bounded notification channel.
pub fn create_event_channel(
    capacity: usize,
) -> (SyncEventHandle, mpsc::Receiver<SyncEventEnvelope>) {
    let (tx, rx) = mpsc::channel(capacity);
    (SyncEventHandle::new(tx), rx)
}

/// Handle for emitting sync events
///
/// This is cheaply cloneable and can be shared across tasks. Emitting never
/// fails the caller: a full or closed channel is only logged.
#[derive(Clone)]
pub struct SyncEventHandle {
    tx: mpsc::Sender<SyncEventEnvelope>,
}

impl SyncEventHandle {
    pub fn new(tx: mpsc::Sender<SyncEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: SyncEvent) {
        let envelope = SyncEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit sync event: {}", e);
        }
    }

    /// Emit an event without waiting.
    ///
    /// Returns true if the event was queued.
    pub fn try_emit(&self, event: SyncEvent) -> bool {
        let event_type = event.event_type();
        let envelope = SyncEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(event_type = event_type, "Failed to emit sync event: {}", e);
                false
            }
        }
    }
}
