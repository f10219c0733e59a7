//! Transport seam and its WebSocket implementation.
//!
//! [`ConnectionManager`](super::ConnectionManager) only talks to the
//! [`Connector`] and [`Transport`] traits. [`WsConnector`] opens real
//! tokio-tungstenite client sockets; tests plug in scripted transports.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the WebSocket opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on the closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Frame
// ============================================================================

/// One message read from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Ping from the peer.
    Ping(Vec<u8>),
    /// Pong answering one of our pings.
    Pong(Vec<u8>),
    /// Peer started the closing handshake.
    Close,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::Text(text.as_str().to_owned()),
            Message::Binary(data) => Self::Binary(data.to_vec()),
            Message::Ping(data) => Self::Ping(data.to_vec()),
            Message::Pong(data) => Self::Pong(data.to_vec()),
            Message::Close(_) => Self::Close,
            raw @ Message::Frame(_) => Self::Binary(raw.into_data().to_vec()),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// An open, bidirectional connection to the controller.
#[async_trait]
pub trait Transport: Send {
    /// Reads the next frame.
    ///
    /// Returns `None` once the stream has ended. Must be cancel-safe: the
    /// session drops a pending `recv` when it handles a probe or shutdown.
    async fn recv(&mut self) -> Option<Result<Frame>>;

    /// Sends a ping carrying `payload`.
    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Closes the transport. Errors are swallowed.
    async fn close(&mut self);
}

/// Opens transports to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new transport to `endpoint`.
    async fn open(&self, endpoint: &Url) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// Opens plain `ws://` client connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &Url) -> Result<Box<dyn Transport>> {
        let (stream, response) = timeout(HANDSHAKE_TIMEOUT, connect_async(endpoint.as_str()))
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "WebSocket handshake with {endpoint} timed out after {}ms",
                    HANDSHAKE_TIMEOUT.as_millis()
                ))
            })?
            .map_err(|e| Error::connection(format!("WebSocket handshake with {endpoint} failed: {e}")))?;

        debug!(%endpoint, status = %response.status(), "WebSocket handshake completed");

        Ok(Box::new(WsTransport { stream }))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// tokio-tungstenite client socket.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        match self.stream.next().await? {
            Ok(message) => Some(Ok(Frame::from(message))),
            Err(e) => Some(Err(Error::WebSocket(e))),
        }
    }

    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stream.send(Message::Ping(payload.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        match timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("WebSocket closed"),
            Ok(Err(e)) => debug!(error = %e, "WebSocket close failed"),
            Err(_) => debug!("WebSocket close timed out"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
