//! Hub implementation
//!
//! The central registry that tracks every live session and fans messages out
//! to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::Message;
use crate::session::{ClientSession, Identity, Role, SessionContext, SessionId};
use crate::stats::{HubCounters, HubStats};
use crate::transport::ConnectionAdapter;

use super::config::HubConfig;
use super::entry::{BroadcastReport, Enqueue, Registration, SessionControl, SessionEntry};

/// Central registry of live sessions
///
/// Thread-safe via `RwLock`: broadcasts share the read lock while iterating,
/// so a fan-out always sees a registry that no one is mutating; register,
/// unregister and evictions take the write lock.
pub struct Hub {
    /// Session handle to entry
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,

    /// Mirrors `sessions.len()`, readable without locking
    active: AtomicUsize,

    next_session_id: AtomicU64,

    counters: HubCounters,

    /// Parent of every session's cancel token
    shutdown: CancellationToken,

    /// Configuration
    config: HubConfig,
}

impl Hub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
            next_session_id: AtomicU64::new(1),
            counters: HubCounters::default(),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a session with the configured queue capacity
    pub async fn register(&self, identity: Identity) -> Registration {
        self.register_with_capacity(identity, self.config.queue_capacity)
            .await
    }

    /// Register a session with an explicit outbound queue capacity
    ///
    /// Handles are allocated here, so every call yields a distinct session even
    /// for the same identity. A session registered after [`Hub::shutdown`]
    /// starts out cancelled and closes as soon as it runs.
    pub async fn register_with_capacity(&self, identity: Identity, capacity: usize) -> Registration {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let context = SessionContext::new(id, identity);
        let (tx, outbound) = mpsc::channel(capacity.max(1));
        let control = Arc::new(SessionControl::new(self.shutdown.child_token()));

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionEntry::new(context.clone(), tx, Arc::clone(&control)),
        );
        let connected = sessions.len();
        self.active.store(connected, Ordering::Release);
        drop(sessions);

        self.counters.on_connect();
        tracing::info!(
            session_id = %id,
            user_id = %context.user_id(),
            role = %context.role(),
            connected = connected,
            "Session registered"
        );

        Registration {
            context,
            outbound,
            control,
        }
    }

    /// Remove a session and close its outbound queue
    ///
    /// Returns `false` if the session was already gone; teardown may be
    /// triggered from several places and only the first call has an effect.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.remove(&id) else {
            return false;
        };
        let connected = sessions.len();
        self.active.store(connected, Ordering::Release);
        drop(sessions);

        tracing::info!(
            session_id = %id,
            user_id = %entry.user_id(),
            role = %entry.role(),
            connected = connected,
            duration_ms = entry.context.duration().as_millis() as u64,
            "Session unregistered"
        );
        true
    }

    /// Register a session and spawn the tasks that drive its connection
    pub async fn admit<A>(self: &Arc<Self>, adapter: A, identity: Identity) -> (SessionId, JoinHandle<()>)
    where
        A: ConnectionAdapter,
    {
        let registration = self.register(identity).await;
        let id = registration.context.id;
        let session = ClientSession::new(Arc::clone(self), registration, adapter);
        (id, tokio::spawn(session.run()))
    }

    /// Send a message to every session of one user
    pub async fn broadcast_to_user(&self, user_id: &str, message: &Message) -> Result<BroadcastReport> {
        self.broadcast_to(|entry| entry.user_id() == user_id, message, user_id)
            .await
    }

    /// Send a message to every session with the given role
    pub async fn broadcast_to_role(&self, role: Role, message: &Message) -> Result<BroadcastReport> {
        self.broadcast_to(|entry| entry.role() == role, message, role.as_str())
            .await
    }

    /// Send a message to every session
    pub async fn broadcast_to_all(&self, message: &Message) -> Result<BroadcastReport> {
        self.broadcast_to(|_| true, message, "all").await
    }

    /// Serialize once, fan out to matching sessions, evict slow ones
    async fn broadcast_to(
        &self,
        filter: impl Fn(&SessionEntry) -> bool,
        message: &Message,
        target: &str,
    ) -> Result<BroadcastReport> {
        let frame: Bytes = match message.encode() {
            Ok(frame) => frame,
            // Catalog payloads hold only strings, numbers, UUIDs and
            // timestamps, none of which serde_json rejects
            Err(e) => {
                tracing::warn!(
                    event_type = %message.event_type(),
                    target = target,
                    error = %e,
                    "Failed to serialize message, broadcast aborted"
                );
                return Err(e);
            }
        };

        let mut report = BroadcastReport::default();
        let mut to_remove = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for entry in sessions.values().filter(|entry| filter(entry)) {
                report.recipients += 1;
                match entry.try_enqueue(frame.clone()) {
                    Enqueue::Queued => report.delivered += 1,
                    Enqueue::Full => {
                        entry.control.mark_evicted();
                        to_remove.push(entry.context.id);
                    }
                    Enqueue::Closed => to_remove.push(entry.context.id),
                }
            }
        }

        if report.no_recipient() {
            tracing::debug!(
                event_type = %message.event_type(),
                target = target,
                "No recipient for broadcast"
            );
        } else {
            tracing::debug!(
                event_type = %message.event_type(),
                target = target,
                recipients = report.recipients,
                delivered = report.delivered,
                "Broadcast event"
            );
        }

        if !to_remove.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in to_remove {
                if let Some(entry) = sessions.remove(&id) {
                    if entry.control.is_evicted() {
                        report.evicted += 1;
                        self.counters.on_eviction();
                        tracing::warn!(
                            session_id = %id,
                            user_id = %entry.user_id(),
                            target = target,
                            "Outbound queue full, evicting slow session"
                        );
                    } else {
                        report.dropped += 1;
                        tracing::debug!(session_id = %id, "Dropping session with closed queue");
                    }
                }
            }
            self.active.store(sessions.len(), Ordering::Release);
        }

        self.counters
            .on_broadcast(report.recipients, report.delivered);
        Ok(report)
    }

    /// Number of registered sessions
    pub fn connected_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Number of registered sessions with the given role
    pub async fn connected_count_by_role(&self, role: Role) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.role() == role)
            .count()
    }

    /// Whether a session is still registered
    pub async fn is_registered(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> HubStats {
        self.counters.snapshot(self.connected_count())
    }

    /// Ask every session to close its connection, including sessions
    /// registered from now on
    ///
    /// Sessions unregister themselves as their tasks finish.
    pub async fn shutdown(&self) {
        let sessions = self.sessions.read().await.len();
        tracing::info!(sessions = sessions, "Closing all sessions");
        self.shutdown.cancel();
    }

    /// Whether [`Hub::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
