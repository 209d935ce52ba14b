//! Connection adapters
//!
//! The hub never touches sockets directly. A session drives one
//! [`ConnectionAdapter`], split into a writing half ([`FrameSink`]) owned by
//! the writer loop and a reading half ([`FrameSource`]) owned by the reader
//! loop.
//!
//! Two adapters ship with the crate:
//!
//! - [`WebSocketConnection`]: a server-side `tokio-tungstenite` stream
//! - [`ChannelConnection`]: an in-memory pair, for tests and local tooling

pub mod channel;
pub mod websocket;

use std::future::Future;

use bytes::Bytes;

pub use channel::{ChannelConnection, ChannelPeer, PeerEvent};
pub use websocket::WebSocketConnection;

/// Error raised by a connection adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer or the local side already closed the connection
    #[error("connection closed")]
    Closed,
    /// A write did not complete within the configured timeout
    #[error("write timed out")]
    Timeout,
    /// Underlying I/O or protocol failure
    #[error("{0}")]
    Io(String),
}

/// Why the server is closing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Regular teardown (client left, server shutting down)
    Normal,
    /// The session's outbound queue overflowed and it was evicted
    Backpressure,
}

impl CloseReason {
    /// WebSocket close code for this reason
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            // "Try Again Later"
            CloseReason::Backpressure => 1013,
        }
    }

    /// Human-readable close reason sent to the peer
    pub fn description(&self) -> &'static str {
        match self {
            CloseReason::Normal => "closing",
            CloseReason::Backpressure => "slow consumer",
        }
    }
}

/// Writing half of a connection
pub trait FrameSink: Send + 'static {
    /// Write one serialized message to the peer
    fn send(&mut self, frame: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a liveness probe
    fn ping(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection, telling the peer why
    fn close(
        &mut self,
        reason: CloseReason,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Reading half of a connection
pub trait FrameSource: Send + 'static {
    /// Wait for the next inbound payload
    ///
    /// Returns `Ok(None)` once the peer has closed the connection. Control
    /// frames are handled by the adapter and never returned.
    fn receive(&mut self) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;
}

/// A physical duplex connection that can be driven by two independent loops
pub trait ConnectionAdapter: Send + 'static {
    /// Writing half
    type Sink: FrameSink;
    /// Reading half
    type Source: FrameSource;

    /// Split into independently owned halves
    fn split(self) -> (Self::Sink, Self::Source);
}
