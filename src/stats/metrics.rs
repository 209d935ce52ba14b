//! Statistics for the event hub

use std::sync::atomic::{AtomicU64, Ordering};

/// Hub-wide statistics snapshot
///
/// Values are read independently and may be slightly inconsistent with each
/// other under concurrent activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Sessions currently registered
    pub active_connections: u64,
    /// Sessions ever registered
    pub total_connections: u64,
    /// Sessions removed because their outbound queue was full
    pub evictions: u64,
    /// Broadcast calls that reached the fan-out stage
    pub broadcasts: u64,
    /// Broadcast calls that matched no session
    pub undelivered_broadcasts: u64,
    /// Frames successfully enqueued across all sessions
    pub messages_enqueued: u64,
}

/// Live counters backing [`HubStats`]
#[derive(Debug, Default)]
pub(crate) struct HubCounters {
    total_connections: AtomicU64,
    evictions: AtomicU64,
    broadcasts: AtomicU64,
    undelivered_broadcasts: AtomicU64,
    messages_enqueued: AtomicU64,
}

impl HubCounters {
    pub(crate) fn on_connect(&self) -> u64 {
        self.total_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn on_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_broadcast(&self, recipients: usize, enqueued: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        if recipients == 0 {
            self.undelivered_broadcasts.fetch_add(1, Ordering::Relaxed);
        }
        self.messages_enqueued
            .fetch_add(enqueued as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active_connections: usize) -> HubStats {
        HubStats {
            active_connections: active_connections as u64,
            total_connections: self.total_connections.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            undelivered_broadcasts: self.undelivered_broadcasts.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
        }
    }
}
