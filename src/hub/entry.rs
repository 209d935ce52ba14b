//! Session entry and broadcast result types
//!
//! This module defines the per-session state stored in the hub registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::{Role, SessionContext};

/// State shared between a registry entry and the session's own tasks
#[derive(Debug, Default)]
pub struct SessionControl {
    evicted: AtomicBool,
    cancel: CancellationToken,
}

impl SessionControl {
    /// Control whose loops stop when `cancel` is cancelled
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            evicted: AtomicBool::new(false),
            cancel,
        }
    }

    /// Whether the hub evicted this session for being too slow
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_evicted(&self) {
        self.evicted.store(true, Ordering::Release);
    }

    /// Token that stops both session loops when cancelled
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Result of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueue {
    Queued,
    /// Queue at capacity; the consumer is too slow
    Full,
    /// The session's receiving side is gone
    Closed,
}

/// Entry for a single session in the registry
///
/// Owns the only sender of the session's outbound queue: dropping the entry
/// closes the queue.
pub(crate) struct SessionEntry {
    pub(crate) context: SessionContext,
    tx: mpsc::Sender<Bytes>,
    pub(crate) control: Arc<SessionControl>,
}

impl SessionEntry {
    pub(crate) fn new(
        context: SessionContext,
        tx: mpsc::Sender<Bytes>,
        control: Arc<SessionControl>,
    ) -> Self {
        Self {
            context,
            tx,
            control,
        }
    }

    pub(crate) fn user_id(&self) -> &str {
        self.context.user_id()
    }

    pub(crate) fn role(&self) -> Role {
        self.context.role()
    }

    /// Push a frame without waiting
    pub(crate) fn try_enqueue(&self, frame: Bytes) -> Enqueue {
        match self.tx.try_send(frame) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueue::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }
}

/// What a newly registered session needs to drive its connection
pub struct Registration {
    /// Identity and handle of the session
    pub context: SessionContext,
    /// Receiving side of the outbound queue
    pub outbound: mpsc::Receiver<Bytes>,
    /// Eviction flag and cancellation shared with the hub
    pub control: Arc<SessionControl>,
}

/// Outcome of one broadcast call
///
/// Only counts are reported; which sessions were evicted is not exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions matching the target
    pub recipients: usize,
    /// Sessions the frame was enqueued for
    pub delivered: usize,
    /// Sessions removed because their queue was full
    pub evicted: usize,
    /// Sessions removed because their receiving side was already gone
    pub dropped: usize,
}

impl BroadcastReport {
    /// True when no session matched the target
    pub fn no_recipient(&self) -> bool {
        self.recipients == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Identity, SessionId};

    fn entry(capacity: usize) -> (SessionEntry, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let context = SessionContext::new(SessionId(1), Identity::new("u1", Role::User));
        (
            SessionEntry::new(context, tx, Arc::new(SessionControl::default())),
            rx,
        )
    }

    #[test]
    fn test_try_enqueue_full() {
        let (entry, _rx) = entry(1);

        assert_eq!(entry.try_enqueue(Bytes::from_static(b"a")), Enqueue::Queued);
        assert_eq!(entry.try_enqueue(Bytes::from_static(b"b")), Enqueue::Full);
    }

    #[test]
    fn test_try_enqueue_closed() {
        let (entry, rx) = entry(1);
        drop(rx);

        assert_eq!(entry.try_enqueue(Bytes::from_static(b"a")), Enqueue::Closed);
    }

    #[test]
    fn test_control_eviction_flag() {
        let control = SessionControl::default();
        assert!(!control.is_evicted());

        control.mark_evicted();
        assert!(control.is_evicted());
        assert!(!control.cancel_token().is_cancelled());
    }
}
