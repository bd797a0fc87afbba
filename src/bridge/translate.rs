//! # Frame Translator
//!
//! Converts one voice frame into a binary transport message, and applies the
//! matching reply back onto the frame in place.
//!
//! ## Pairing:
//! Exactly one inbound message is consumed per outbound voice frame — no
//! retries, no read-ahead. The session controller relies on this to keep the
//! audio path half-duplex-paced.

use crate::channel::ChannelFrame;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::{MessageTransport, Opcode, TransportMessage};

/// What the remote endpoint's reply did to the outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceReply {
    /// A binary reply overwrote the frame payload; carries the reply length
    Updated(usize),
    /// A text or unrecognized message arrived; the frame is untouched
    Ignored,
}

/// Forward one voice frame and consume its matching reply.
///
/// ## Outbound:
/// The frame payload is sent as one binary message, exact length.
///
/// ## Inbound dispatch:
/// - **close**: `RemoteClosed`, terminal for the session
/// - **binary**: overwrite the frame payload in place. A reply longer than
///   the frame's buffer is a `PayloadTooLarge` error rather than a silent
///   truncation; a shorter reply overwrites the leading samples only.
/// - **text** and everything else: no mutation, reported as `Ignored`
pub async fn forward_voice<T: MessageTransport>(
    frame: &mut ChannelFrame,
    transport: &mut T,
) -> BridgeResult<VoiceReply> {
    transport
        .send(TransportMessage::binary(frame.payload.clone()))
        .await?;

    let reply = transport.receive().await?;

    match reply.opcode {
        Opcode::Close => Err(BridgeError::RemoteClosed(
            "close received on voice path".to_string(),
        )),
        Opcode::Binary => {
            let capacity = frame.payload.len();
            if reply.payload.len() > capacity {
                return Err(BridgeError::PayloadTooLarge {
                    got: reply.payload.len(),
                    capacity,
                });
            }
            frame.payload[..reply.payload.len()].copy_from_slice(&reply.payload);
            Ok(VoiceReply::Updated(reply.payload.len()))
        }
        _ => Ok(VoiceReply::Ignored),
    }
}
