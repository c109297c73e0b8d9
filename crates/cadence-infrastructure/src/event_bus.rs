//! Tenant-keyed session notification bus over `tokio::sync::broadcast`.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use cadence_core::session::{SessionEvent, SessionEventPublisher};

const DEFAULT_CAPACITY: usize = 256;

/// One broadcast channel per tenant, created on first subscription.
///
/// Slow subscribers lag and lose the oldest events; publishing never blocks.
pub struct BroadcastSessionEventBus {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<SessionEvent>>>,
}

impl Default for BroadcastSessionEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastSessionEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Receives every event published for `tenant_id` from now on.
    pub fn subscribe(&self, tenant_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl SessionEventPublisher for BroadcastSessionEventBus {
    fn publish(&self, tenant_id: &str, event: SessionEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = channels.get(tenant_id) else {
            return;
        };
        let kind = event.event;
        let session_id = event.session.id.clone();
        if sender.send(event).is_err() {
            // Every subscriber went away
            channels.remove(tenant_id);
            return;
        }
        tracing::debug!(
            "[SessionEventBus] Published {:?} for session {} (tenant {})",
            kind,
            session_id,
            tenant_id
        );
    }
}
