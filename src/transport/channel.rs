//! In-memory connection adapter
//!
//! A [`ChannelConnection`] behaves like a socket whose far end is a
//! [`ChannelPeer`] held by the caller. Writes are bounded: a peer that stops
//! reading eventually stalls the writer, just like a full TCP send buffer.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{CloseReason, ConnectionAdapter, FrameSink, FrameSource, TransportError};

/// Something the server side wrote to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A serialized message
    Frame(Bytes),
    /// A keepalive probe
    Ping,
    /// The server closed the connection
    Close(CloseReason),
}

/// Server side of an in-memory connection
pub struct ChannelConnection {
    outgoing: mpsc::Sender<PeerEvent>,
    incoming: mpsc::Receiver<Bytes>,
}

/// Client side of an in-memory connection
pub struct ChannelPeer {
    events: mpsc::Receiver<PeerEvent>,
    inbound: Option<mpsc::Sender<Bytes>>,
}

impl ChannelConnection {
    /// Create a connected pair; `capacity` bounds the number of unread writes
    pub fn pair(capacity: usize) -> (ChannelConnection, ChannelPeer) {
        let (outgoing, events) = mpsc::channel(capacity.max(1));
        let (inbound, incoming) = mpsc::channel(capacity.max(1));
        (
            ChannelConnection { outgoing, incoming },
            ChannelPeer {
                events,
                inbound: Some(inbound),
            },
        )
    }
}

impl ConnectionAdapter for ChannelConnection {
    type Sink = ChannelSink;
    type Source = ChannelSource;

    fn split(self) -> (Self::Sink, Self::Source) {
        (
            ChannelSink {
                outgoing: self.outgoing,
            },
            ChannelSource {
                incoming: self.incoming,
            },
        )
    }
}

/// Writing half of a [`ChannelConnection`]
pub struct ChannelSink {
    outgoing: mpsc::Sender<PeerEvent>,
}

impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.outgoing
            .send(PeerEvent::Frame(frame))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.outgoing
            .send(PeerEvent::Ping)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        self.outgoing
            .send(PeerEvent::Close(reason))
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Reading half of a [`ChannelConnection`]
pub struct ChannelSource {
    incoming: mpsc::Receiver<Bytes>,
}

impl FrameSource for ChannelSource {
    async fn receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.incoming.recv().await)
    }
}

impl ChannelPeer {
    /// Next event written by the server, or `None` once the server side is gone
    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    /// Next message frame, skipping pings; `None` on close
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            match self.events.recv().await? {
                PeerEvent::Frame(frame) => return Some(frame),
                PeerEvent::Ping => continue,
                PeerEvent::Close(_) => return None,
            }
        }
    }

    /// Send a payload to the server
    pub async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        match &self.inbound {
            Some(tx) => tx.send(payload).await.map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Hang up: the server's reader observes a closed connection
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }
}
