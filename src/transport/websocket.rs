//! WebSocket connection adapter
//!
//! Wraps an upgraded `tokio-tungstenite` stream. Text frames carry the JSON
//! envelopes produced by the hub; ping/pong is answered by tungstenite itself
//! and never reaches the session loops.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use super::{CloseReason, ConnectionAdapter, FrameSink, FrameSource, TransportError};

/// Server-side WebSocket connection
pub struct WebSocketConnection<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already upgraded stream
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl<S> ConnectionAdapter for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Sink = WebSocketSink<S>;
    type Source = WebSocketSource<S>;

    fn split(self) -> (Self::Sink, Self::Source) {
        let (sink, stream) = self.stream.split();
        (WebSocketSink { sink }, WebSocketSource { stream })
    }
}

/// Writing half of a [`WebSocketConnection`]
pub struct WebSocketSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let text = Utf8Bytes::try_from(frame).map_err(|e| TransportError::Io(e.to_string()))?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(map_ws_error)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(reason.code()),
            reason: Utf8Bytes::from_static(reason.description()),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(map_ws_error)?;
        self.sink.close().await.map_err(map_ws_error)
    }
}

/// Reading half of a [`WebSocketConnection`]
pub struct WebSocketSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(Bytes::from(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) => return Ok(None),
                Some(Err(e)) => return Err(map_ws_error(e)),
            }
        }
    }
}

fn map_ws_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::Io(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_errors_map_to_closed() {
        assert_eq!(
            map_ws_error(tungstenite::Error::ConnectionClosed),
            TransportError::Closed
        );
        assert_eq!(
            map_ws_error(tungstenite::Error::AlreadyClosed),
            TransportError::Closed
        );
    }

    #[test]
    fn test_other_errors_map_to_io() {
        let err = tungstenite::Error::Io(std::io::Error::other("connection reset"));
        assert!(matches!(map_ws_error(err), TransportError::Io(_)));
    }
}
