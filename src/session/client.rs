//! Client session loops
//!
//! Each admitted connection is driven by two cooperating loops joined in one
//! task:
//!
//! - the writer drains the outbound queue in FIFO order and writes each frame
//!   to the connection, pinging it periodically
//! - the reader waits on the connection, discarding anything the client sends,
//!   until the client goes away
//!
//! Both share one cancellation token. Whichever loop ends first cancels the
//! other, so neither can outlive its peer, and the connection halves are
//! dropped together.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant, Interval};
use tokio_util::sync::CancellationToken;

use crate::events::{ConnectionState, Message};
use crate::hub::{Hub, Registration, SessionControl};
use crate::transport::{CloseReason, ConnectionAdapter, FrameSink, FrameSource};

use super::context::{SessionContext, SessionId};

/// One admitted connection, ready to run
pub struct ClientSession<A> {
    context: SessionContext,
    hub: Arc<Hub>,
    adapter: A,
    outbound: mpsc::Receiver<Bytes>,
    control: Arc<SessionControl>,
    guard: RegistrationGuard,
}

impl<A: ConnectionAdapter> ClientSession<A> {
    /// Bind a registration to the connection it was created for
    ///
    /// Dropping the session without running it unregisters it.
    pub fn new(hub: Arc<Hub>, registration: Registration, adapter: A) -> Self {
        let guard = RegistrationGuard {
            hub: Some(Arc::clone(&hub)),
            id: registration.context.id,
        };
        Self {
            context: registration.context,
            hub,
            adapter,
            outbound: registration.outbound,
            control: registration.control,
            guard,
        }
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Drive the connection until either side ends it
    pub async fn run(self) {
        let ClientSession {
            context,
            hub,
            adapter,
            outbound,
            control,
            guard,
        } = self;
        let id = context.id;
        let cancel = control.cancel_token().clone();
        let (sink, source) = adapter.split();

        // A session admitted after hub shutdown goes straight to closing
        let greeting = if hub.config().send_greeting && !cancel.is_cancelled() {
            greeting_frame(&context)
        } else {
            None
        };

        let writer = Writer {
            id,
            hub: Arc::clone(&hub),
            sink,
            outbound,
            control: Arc::clone(&control),
            write_timeout: hub.config().write_timeout,
            ping: hub
                .config()
                .ping_interval
                .filter(|period| !period.is_zero())
                .map(|period| tokio::time::interval_at(Instant::now() + period, period)),
        };

        tokio::join!(
            writer.run(greeting, cancel.clone()),
            read_loop(id, Arc::clone(&hub), source, cancel)
        );

        // Only has an effect when the hub itself cancelled the session
        hub.unregister(id).await;
        guard.disarm();

        tracing::info!(
            session_id = %id,
            user_id = %context.user_id(),
            duration_secs = context.duration().as_secs(),
            evicted = control.is_evicted(),
            "Session closed"
        );
    }
}

/// Unregisters the session if it is dropped unrun, or its task is aborted or
/// unwinds before the normal teardown
struct RegistrationGuard {
    hub: Option<Arc<Hub>>,
    id: SessionId,
}

impl RegistrationGuard {
    fn disarm(mut self) {
        self.hub = None;
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        let Some(hub) = self.hub.take() else {
            return;
        };
        let id = self.id;
        tracing::warn!(session_id = %id, "Session task ended abnormally");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                hub.unregister(id).await;
            });
        }
    }
}

fn greeting_frame(context: &SessionContext) -> Option<Bytes> {
    let message =
        Message::connection_status(ConnectionState::Connected).for_user(context.user_id());
    match message.encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(session_id = %context.id, error = %e, "Failed to encode greeting");
            None
        }
    }
}

struct Writer<S> {
    id: SessionId,
    hub: Arc<Hub>,
    sink: S,
    outbound: mpsc::Receiver<Bytes>,
    control: Arc<SessionControl>,
    write_timeout: Duration,
    ping: Option<Interval>,
}

impl<S: FrameSink> Writer<S> {
    async fn run(mut self, greeting: Option<Bytes>, cancel: CancellationToken) {
        if let Some(frame) = greeting {
            if !self.write(frame).await {
                self.hub.unregister(self.id).await;
                cancel.cancel();
                return;
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.close(CloseReason::Normal).await;
                    break;
                }

                frame = self.outbound.recv() => match frame {
                    Some(frame) => {
                        if !self.write(frame).await {
                            self.hub.unregister(self.id).await;
                            break;
                        }
                    }
                    None => {
                        // Queue closed by the hub
                        let reason = if self.control.is_evicted() {
                            CloseReason::Backpressure
                        } else {
                            CloseReason::Normal
                        };
                        self.close(reason).await;
                        break;
                    }
                },

                _ = next_tick(&mut self.ping) => {
                    match timeout(self.write_timeout, self.sink.ping()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(session_id = %self.id, error = %e, "Ping failed");
                            self.hub.unregister(self.id).await;
                            break;
                        }
                        Err(_) => {
                            tracing::debug!(session_id = %self.id, "Ping timed out");
                            self.hub.unregister(self.id).await;
                            break;
                        }
                    }
                }
            }
        }

        cancel.cancel();
    }

    /// Write one frame; `false` means the connection is unusable
    async fn write(&mut self, frame: Bytes) -> bool {
        match timeout(self.write_timeout, self.sink.send(frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(session_id = %self.id, error = %e, "Write failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    session_id = %self.id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Write timed out"
                );
                false
            }
        }
    }

    async fn close(&mut self, reason: CloseReason) {
        match timeout(self.write_timeout, self.sink.close(reason)).await {
            Ok(Ok(())) => {
                tracing::debug!(session_id = %self.id, reason = ?reason, "Connection closed");
            }
            // The peer may already be gone
            Ok(Err(_)) | Err(_) => {}
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn read_loop<R: FrameSource>(
    id: SessionId,
    hub: Arc<Hub>,
    mut source: R,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            received = source.receive() => match received {
                Ok(Some(payload)) => {
                    tracing::trace!(session_id = %id, bytes = payload.len(), "Discarding inbound payload");
                }
                Ok(None) => {
                    tracing::debug!(session_id = %id, "Peer closed connection");
                    hub.unregister(id).await;
                    break;
                }
                Err(e) => {
                    tracing::debug!(session_id = %id, error = %e, "Read failed");
                    hub.unregister(id).await;
                    break;
                }
            },
        }
    }

    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;
    use crate::session::{Identity, Role};
    use crate::transport::{ChannelConnection, PeerEvent};

    fn hub(config: HubConfig) -> Arc<Hub> {
        Arc::new(Hub::with_config(config))
    }

    fn quiet() -> HubConfig {
        HubConfig::default().disable_ping().disable_greeting()
    }

    fn frame_type(frame: &Bytes) -> String {
        let json: serde_json::Value = serde_json::from_slice(frame).unwrap();
        json["type"].as_str().unwrap().to_string()
    }

    async fn wait_for_count(hub: &Hub, expected: usize) {
        timeout(Duration::from_secs(2), async {
            while hub.connected_count() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connection count never reached expected value");
    }

    #[tokio::test]
    async fn test_greeting_then_messages_in_order() {
        let hub = hub(HubConfig::default().disable_ping());
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (_id, _task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        let greeting = peer.next_frame().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&greeting).unwrap();
        assert_eq!(json["type"], "connection-status");
        assert_eq!(json["data"]["status"], "connected");
        assert_eq!(json["userId"], "u1");

        for i in 0..5u64 {
            hub.broadcast_to_user("u1", &Message::download_count_update("f", "s", i))
                .await
                .unwrap();
        }
        for i in 0..5u64 {
            let frame = peer.next_frame().await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
            assert_eq!(json["data"]["count"], i);
        }
    }

    #[tokio::test]
    async fn test_peer_disconnect_unregisters_and_ends_task() {
        let hub = hub(quiet());
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;
        assert!(hub.is_registered(id).await);

        peer.disconnect();

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_inbound_payloads_are_ignored() {
        let hub = hub(quiet());
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (id, _task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        peer.send(Bytes::from_static(b"{\"hello\":1}")).await.unwrap();
        hub.broadcast_to_all(&Message::file_deleted("f", "n")).await.unwrap();

        let frame = peer.next_frame().await.unwrap();
        assert_eq!(frame_type(&frame), "file-deleted");
        assert!(hub.is_registered(id).await);
    }

    #[tokio::test]
    async fn test_dropped_peer_ends_both_loops() {
        let hub = hub(quiet());
        let (conn, peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        drop(peer);
        hub.broadcast_to_all(&Message::file_deleted("f", "n")).await.unwrap();

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.is_registered(id).await);
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out() {
        let hub = hub(quiet().write_timeout(Duration::from_millis(50)));
        let (conn, _peer) = ChannelConnection::pair(1);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        // First frame fills the connection, second write never completes
        hub.broadcast_to_all(&Message::file_deleted("f", "1")).await.unwrap();
        hub.broadcast_to_all(&Message::file_deleted("f", "2")).await.unwrap();

        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.is_registered(id).await);
    }

    #[tokio::test]
    async fn test_eviction_closes_with_backpressure_reason() {
        let hub = hub(HubConfig::default().disable_ping().queue_capacity(1));
        let (conn, mut peer) = ChannelConnection::pair(1);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        // Greeting fills the connection buffer; at most one frame can be in
        // flight in the writer and one in the queue, so the third overflows
        for i in 0..3u64 {
            hub.broadcast_to_all(&Message::download_count_update("f", "s", i))
                .await
                .unwrap();
        }
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.stats().evictions, 1);

        let mut last = None;
        while let Some(event) = peer.next_event().await {
            let closing = matches!(event, PeerEvent::Close(_));
            last = Some(event);
            if closing {
                break;
            }
        }
        assert_eq!(last, Some(PeerEvent::Close(CloseReason::Backpressure)));
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unregister_closes_connection_normally() {
        let hub = hub(quiet());
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        assert!(hub.unregister(id).await);

        assert_eq!(
            peer.next_event().await,
            Some(PeerEvent::Close(CloseReason::Normal))
        );
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_hub_shutdown_closes_sessions() {
        let hub = hub(quiet());
        let (conn_a, _peer_a) = ChannelConnection::pair(16);
        let (conn_b, _peer_b) = ChannelConnection::pair(16);
        let (_a, task_a) = hub.admit(conn_a, Identity::new("u1", Role::User)).await;
        let (_b, task_b) = hub.admit(conn_b, Identity::new("u2", Role::Admin)).await;

        hub.shutdown().await;

        timeout(Duration::from_secs(2), task_a).await.unwrap().unwrap();
        timeout(Duration::from_secs(2), task_b).await.unwrap().unwrap();
        wait_for_count(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_session_admitted_after_shutdown_closes() {
        let hub = hub(HubConfig::default().disable_ping());
        hub.shutdown().await;

        let (conn, mut peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("late", Role::User)).await;

        assert_eq!(
            peer.next_event().await,
            Some(PeerEvent::Close(CloseReason::Normal))
        );
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_ping_interval_keeps_session_alive() {
        let config = HubConfig {
            ping_interval: Some(Duration::ZERO),
            ..quiet()
        };
        let hub = hub(config);
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        hub.broadcast_to_all(&Message::file_deleted("f", "n")).await.unwrap();
        let frame = timeout(Duration::from_secs(2), peer.next_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame_type(&frame), "file-deleted");
        assert!(hub.is_registered(id).await);

        peer.disconnect();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!hub.is_registered(id).await);
    }

    #[tokio::test]
    async fn test_aborted_session_unregisters() {
        let hub = hub(quiet());
        let (conn, _peer) = ChannelConnection::pair(16);
        let (id, task) = hub.admit(conn, Identity::new("u1", Role::User)).await;
        assert!(hub.is_registered(id).await);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        wait_for_count(&hub, 0).await;
        assert!(!hub.is_registered(id).await);
    }

    #[tokio::test]
    async fn test_keepalive_pings() {
        let hub = hub(
            HubConfig::default()
                .disable_greeting()
                .ping_interval(Duration::from_millis(20)),
        );
        let (conn, mut peer) = ChannelConnection::pair(16);
        let (_id, _task) = hub.admit(conn, Identity::new("u1", Role::User)).await;

        let event = timeout(Duration::from_secs(2), peer.next_event()).await.unwrap();
        assert_eq!(event, Some(PeerEvent::Ping));
    }
}
