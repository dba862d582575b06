//! WebSocket Transport Adapter
//!
//! tokio-tungstenite implementation of the [`Transport`] port. Maps an HTTP
//! 401/403 during the upgrade handshake to
//! [`TransportError::AuthRejected`], which the lifecycle manager treats as
//! terminal rather than retryable.
//!
//! Protocol-level ping frames are answered here; application-level
//! `{"type":"ping"}` frames are the codec's concern and pass through as
//! text.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{Transport, TransportConnection, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Real push-channel transport over tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    /// Create a transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn connect(&self, url: &str) -> Result<Self::Conn, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(classify_connect_error)?;

        let (write, read) = stream.split();
        Ok(WsConnection {
            write,
            read,
            closed: false,
        })
    }
}

/// One established WebSocket connection.
pub struct WsConnection {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    closed: bool,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.write.send(Message::Pong(payload)).await {
                        return Some(Err(TransportError::Io(e.to_string())));
                    }
                }
                Ok(Message::Close(_)) => return Some(Err(TransportError::Closed)),
                // Pongs and binary frames carry nothing for this protocol.
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            // The peer may already be gone; closing is best effort.
            let _ = self.write.send(Message::Close(None)).await;
            let _ = self.write.close().await;
        }
    }
}

fn classify_connect_error(error: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error;

    match error {
        Error::Http(response)
            if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
        {
            TransportError::AuthRejected
        }
        other => TransportError::ConnectFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    #[test]
    fn unauthorized_handshake_maps_to_auth_rejected() {
        let response = Response::builder().status(401).body(None).unwrap();
        let error = tokio_tungstenite::tungstenite::Error::Http(response);
        assert!(matches!(
            classify_connect_error(error),
            TransportError::AuthRejected
        ));
    }

    #[test]
    fn forbidden_handshake_maps_to_auth_rejected() {
        let response = Response::builder().status(403).body(None).unwrap();
        let error = tokio_tungstenite::tungstenite::Error::Http(response);
        assert!(matches!(
            classify_connect_error(error),
            TransportError::AuthRejected
        ));
    }

    #[test]
    fn other_handshake_failures_are_retryable() {
        let error = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
        assert!(matches!(
            classify_connect_error(error),
            TransportError::ConnectFailed(_)
        ));
    }
}
