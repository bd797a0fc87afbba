//! # WebSocket Transport
//!
//! The transport side of the bridge: a duplex, message-oriented connection to
//! the remote audio endpoint.
//!
//! ## Design:
//! The session controller only sees the `MessageTransport` trait — discrete
//! messages tagged with an opcode and a fragmentation flag. `WsTransport` is
//! the production implementation over a tokio-tungstenite client connection;
//! tests substitute scripted in-memory transports.
//!
//! ## Message Format:
//! - **Binary**: raw 16-bit signed-linear audio samples, one channel frame
//!   per message
//! - **Text**: JSON control events (session start, digit presses)

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

/// Sub-protocol identifier advertised during the WebSocket handshake.
pub const SUBPROTOCOL: &str = "echo";

/// Kind of a transport message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Binary,
    Text,
    Close,
    Ping,
    Pong,
    /// Anything the transport surfaces that the bridge has no use for
    Other,
}

/// One discrete message on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    /// Whether this message arrived as part of a fragmented sequence. The
    /// bridge always sends unfragmented messages.
    pub fragmented: bool,
}

impl TransportMessage {
    /// Build an unfragmented binary message.
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            opcode: Opcode::Binary,
            payload,
            fragmented: false,
        }
    }

    /// Build an unfragmented text message.
    pub fn text(payload: String) -> Self {
        Self {
            opcode: Opcode::Text,
            payload: payload.into_bytes(),
            fragmented: false,
        }
    }

    /// Build a close message.
    pub fn close() -> Self {
        Self {
            opcode: Opcode::Close,
            payload: Vec::new(),
            fragmented: false,
        }
    }
}

/// Duplex message channel to the remote endpoint.
///
/// ## Contract:
/// - `send` writes one complete message; failure means the voice path is
///   broken.
/// - `receive` blocks for exactly one complete message. Connection loss and
///   protocol errors surface as `TransportRead`; a graceful close surfaces as
///   a message with the `Close` opcode so the caller can treat it as a
///   distinct, fatal outcome.
#[allow(async_fn_in_trait)]
pub trait MessageTransport {
    async fn send(&mut self, message: TransportMessage) -> BridgeResult<()>;

    async fn receive(&mut self) -> BridgeResult<TransportMessage>;
}

/// Production transport over a tokio-tungstenite client connection.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    read_timeout: Option<Duration>,
}

impl WsTransport {
    /// Connect to the remote endpoint, advertising the fixed sub-protocol.
    ///
    /// ## Parameters:
    /// - **url**: WebSocket URL of the remote endpoint (ws:// or wss://)
    /// - **read_timeout**: optional bound on each `receive`; `None` waits
    ///   indefinitely (the original behavior)
    ///
    /// The sub-protocol is advisory: a peer that negotiates no sub-protocol
    /// at all (the reference echo server does not) is accepted by
    /// reconnecting without the header. Fails with `Connect` if the URL is
    /// malformed or the handshake cannot be completed either way.
    pub async fn connect(url: &str, read_timeout: Option<Duration>) -> BridgeResult<Self> {
        let stream = match Self::handshake(url, true).await {
            Ok(stream) => stream,
            Err(WsError::Protocol(ProtocolError::SecWebSocketSubProtocolError(_))) => {
                debug!("peer negotiated no subprotocol, reconnecting without one");
                Self::handshake(url, false)
                    .await
                    .map_err(|e| BridgeError::Connect(e.to_string()))?
            }
            Err(e) => return Err(BridgeError::Connect(e.to_string())),
        };

        Ok(Self {
            stream,
            read_timeout,
        })
    }

    /// Run one client handshake, with or without the sub-protocol header.
    async fn handshake(
        url: &str,
        advertise_subprotocol: bool,
    ) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, WsError> {
        let mut request = url.into_client_request()?;
        if advertise_subprotocol {
            request.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_static(SUBPROTOCOL),
            );
        }

        let (stream, response) = connect_async(request).await?;
        debug!("WebSocket handshake completed: {:?}", response.status());
        Ok(stream)
    }

    /// Convert a bridge message into the wire representation.
    fn to_ws(message: TransportMessage) -> BridgeResult<Message> {
        match message.opcode {
            Opcode::Binary => Ok(Message::Binary(message.payload)),
            Opcode::Text => {
                let text = String::from_utf8(message.payload).map_err(|_| {
                    BridgeError::TransportWrite("text payload is not valid UTF-8".to_string())
                })?;
                Ok(Message::Text(text))
            }
            Opcode::Close => Ok(Message::Close(None)),
            Opcode::Ping => Ok(Message::Ping(message.payload)),
            Opcode::Pong => Ok(Message::Pong(message.payload)),
            Opcode::Other => Err(BridgeError::TransportWrite(
                "cannot send a message with an unknown opcode".to_string(),
            )),
        }
    }

    /// Convert a wire message into the bridge representation.
    ///
    /// tungstenite reassembles fragmented messages before delivery, so
    /// everything surfaced here is complete and `fragmented` is false.
    fn from_ws(message: Message) -> TransportMessage {
        let (opcode, payload) = match message {
            Message::Binary(data) => (Opcode::Binary, data),
            Message::Text(text) => (Opcode::Text, text.into_bytes()),
            Message::Close(_) => (Opcode::Close, Vec::new()),
            Message::Ping(data) => (Opcode::Ping, data),
            Message::Pong(data) => (Opcode::Pong, data),
            Message::Frame(_) => (Opcode::Other, Vec::new()),
        };
        TransportMessage {
            opcode,
            payload,
            fragmented: false,
        }
    }
}

impl MessageTransport for WsTransport {
    async fn send(&mut self, message: TransportMessage) -> BridgeResult<()> {
        let ws_message = Self::to_ws(message)?;
        self.stream
            .send(ws_message)
            .await
            .map_err(|e| BridgeError::TransportWrite(e.to_string()))
    }

    async fn receive(&mut self) -> BridgeResult<TransportMessage> {
        let next = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.next())
                .await
                .map_err(|_| {
                    BridgeError::TransportRead(format!(
                        "no message within {}ms",
                        limit.as_millis()
                    ))
                })?,
            None => self.stream.next().await,
        };

        match next {
            Some(Ok(message)) => Ok(Self::from_ws(message)),
            Some(Err(e)) => Err(BridgeError::TransportRead(e.to_string())),
            // Stream end without a close frame: the connection is simply gone.
            None => Err(BridgeError::TransportRead("connection ended".to_string())),
        }
    }
}
