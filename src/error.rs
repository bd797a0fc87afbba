//! # Error Handling
//!
//! This module defines the error types for the audio bridge and the policy
//! for how each one propagates.
//!
//! ## Error Policy:
//! Every failure in the bridge is either terminal or explicitly ignored —
//! there is no retry logic anywhere. The split is:
//!
//! - **Setup errors** (`Config`, `Connect`, `HandshakeWrite`, `Format`):
//!   abort before the forward loop is ever entered.
//! - **Voice-path errors** (`TransportWrite`, `TransportRead`, `RemoteClosed`,
//!   `PayloadTooLarge`, `Emit`): always fatal. Once the audio link breaks
//!   there is no recovery path, so the loop terminates.
//! - **Signaling errors** (`SignalSend`): always non-fatal. Digit
//!   notifications are best-effort telemetry; a failed send is logged and the
//!   loop continues.
//!
//! Callers apply this table, never ad hoc per-call decisions. All fatal exits
//! still run session teardown (format restoration).

use std::fmt;

/// Error type covering every failure mode of a bridge session.
///
/// ## Variants:
/// Each variant carries a human-readable message describing the underlying
/// cause (transport error text, format name, etc.).
#[derive(Debug)]
pub enum BridgeError {
    /// Missing or empty remote address — reported before any I/O
    Config(String),

    /// WebSocket client could not establish the connection
    Connect(String),

    /// The Hello announcement could not be written to the transport
    HandshakeWrite(String),

    /// Channel refused the forced signed-linear read or write format
    Format(String),

    /// A voice frame could not be written to the transport
    TransportWrite(String),

    /// A transport read failed or timed out
    TransportRead(String),

    /// The remote endpoint sent a close message on the voice path
    RemoteClosed(String),

    /// A binary reply was larger than the outgoing frame's buffer
    PayloadTooLarge { got: usize, capacity: usize },

    /// The local channel rejected an inbound frame
    Emit(String),

    /// A digit-notification send failed (non-fatal, logged by the caller)
    SignalSend(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BridgeError::Connect(msg) => write!(f, "Could not connect to websocket: {}", msg),
            BridgeError::HandshakeWrite(msg) => {
                write!(f, "Could not write handshake to websocket: {}", msg)
            }
            BridgeError::Format(msg) => write!(f, "Unable to set channel format: {}", msg),
            BridgeError::TransportWrite(msg) => {
                write!(f, "Could not write to websocket: {}", msg)
            }
            BridgeError::TransportRead(msg) => write!(f, "WebSocket read error: {}", msg),
            BridgeError::RemoteClosed(msg) => write!(f, "WebSocket closed: {}", msg),
            BridgeError::PayloadTooLarge { got, capacity } => write!(
                f,
                "Binary reply of {} bytes exceeds frame capacity of {} bytes",
                got, capacity
            ),
            BridgeError::Emit(msg) => write!(f, "Channel rejected inbound frame: {}", msg),
            BridgeError::SignalSend(msg) => {
                write!(f, "Could not send digit notification: {}", msg)
            }
        }
    }
}

impl std::error::Error for BridgeError {}

/// Configuration loading failures surface as `Config` errors.
///
/// ## When this happens:
/// - config.toml has invalid syntax
/// - environment overrides fail to parse
/// - configuration values fail validation
impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl BridgeError {
    /// Whether this error terminates the session.
    ///
    /// This is the single source of truth for the fatal/non-fatal split
    /// described in the module docs. Only digit-notification failures are
    /// survivable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BridgeError::SignalSend(_))
    }
}

/// Shorthand for Results that use the bridge error type.
pub type BridgeResult<T> = Result<T, BridgeError>;
