//! # Event Notifier
//!
//! Sends structured control messages over the transport, independent of the
//! audio path.
//!
//! ## Wire Format:
//! Flat JSON objects tagged by an `Event` key, sent as single unfragmented
//! text messages:
//!
//! ```json
//! {"Event":"Hello","Channel":"demo-tone"}
//! {"Event":"DTMF","Digit":"5"}
//! ```
//!
//! Sending is fire-and-forget from this module's perspective; the caller
//! decides whether a failure is fatal (the Hello announcement) or merely
//! logged (digit presses).

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::transport::{MessageTransport, TransportMessage};

/// A structured notification for the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Event")]
pub enum ControlEvent {
    /// Announces the session and identifies the channel, sent before any
    /// audio flows
    Hello {
        #[serde(rename = "Channel")]
        channel: String,
    },

    /// Reports a digit pressed on the channel
    #[serde(rename = "DTMF")]
    Dtmf {
        #[serde(rename = "Digit")]
        digit: String,
    },
}

impl ControlEvent {
    pub fn hello(channel: &str) -> Self {
        ControlEvent::Hello {
            channel: channel.to_string(),
        }
    }

    pub fn dtmf(digit: char) -> Self {
        ControlEvent::Dtmf {
            digit: digit.to_string(),
        }
    }
}

/// Serialize an event and send it as one text message.
///
/// ## Returns:
/// - **Ok(())**: the message left the transport
/// - **Err(SignalSend)**: serialization or send failure. `SignalSend` is the
///   one non-fatal variant in the error policy table; callers that need a
///   failure to be fatal (the Hello announcement) escalate it themselves.
pub async fn notify<T: MessageTransport>(
    event: &ControlEvent,
    transport: &mut T,
) -> BridgeResult<()> {
    let json =
        serde_json::to_string(event).map_err(|e| BridgeError::SignalSend(e.to_string()))?;

    transport
        .send(TransportMessage::text(json))
        .await
        .map_err(|e| BridgeError::SignalSend(e.to_string()))
}
