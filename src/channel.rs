//! # Channel Abstraction
//!
//! Defines the host side of the bridge: the telephony channel the session
//! reads frames from and emits frames to. The bridge never touches a channel
//! through ambient state; every session receives a `MediaChannel`
//! implementation as an explicit argument.
//!
//! ## Frame Model:
//! A channel delivers discrete, timestamped frames. The bridge cares about
//! two kinds: voice frames (raw signed-linear samples) and digit presses
//! (DTMF). Everything else passes through the loop untouched.

use std::fmt;
use std::time::Duration;

use crate::error::BridgeResult;

/// Audio formats a channel can be negotiated to.
///
/// The bridge itself only ever forces `Slin` (16-bit signed linear PCM); the
/// other variants exist so a channel's pre-session format can be saved and
/// restored faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// 16-bit signed linear PCM, little-endian — the bridge's wire format
    Slin,
    /// G.711 mu-law
    Ulaw,
    /// G.711 a-law
    Alaw,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Slin => "slin",
            AudioFormat::Ulaw => "ulaw",
            AudioFormat::Alaw => "alaw",
        };
        write!(f, "{}", name)
    }
}

/// What a channel frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// One chunk of audio samples
    Voice,
    /// A DTMF digit press
    Digit(char),
    /// Any other channel event (control, silence notification, ...)
    Other,
}

/// One discrete unit of channel data.
///
/// ## Ownership:
/// The session controller owns a frame for exactly one loop iteration; it is
/// dropped at iteration end on every exit path.
#[derive(Debug, Clone)]
pub struct ChannelFrame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
    /// Host-side delivery timing hint. The bridge zeroes this before
    /// forwarding: timing is governed by the realtime loop, not replayed.
    pub delivery: Duration,
}

impl ChannelFrame {
    /// Create a voice frame carrying raw signed-linear samples.
    pub fn voice(payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Voice,
            payload,
            delivery: Duration::ZERO,
        }
    }

    /// Create a digit-press frame.
    pub fn digit(digit: char) -> Self {
        Self {
            kind: FrameKind::Digit(digit),
            payload: Vec::new(),
            delivery: Duration::ZERO,
        }
    }
}

/// The host channel a bridge session is attached to.
///
/// ## Contract:
/// - `wait_frame` blocks until the next channel event; `None` means the
///   channel is gone (hangup) and ends the session cleanly.
/// - `emit_frame` pushes one frame of audio back toward the caller.
/// - The format accessors expose the channel's negotiated read/write formats;
///   a session saves both, forces `Slin`, and restores the saved pair before
///   returning, on every exit path.
#[allow(async_fn_in_trait)]
pub trait MediaChannel {
    /// The channel's unique name, sent in the Hello announcement.
    fn name(&self) -> &str;

    fn read_format(&self) -> AudioFormat;

    fn write_format(&self) -> AudioFormat;

    /// Set the format of audio read from the channel.
    fn set_read_format(&mut self, format: AudioFormat) -> BridgeResult<()>;

    /// Set the format of audio written to the channel.
    fn set_write_format(&mut self, format: AudioFormat) -> BridgeResult<()>;

    /// Block until the next frame arrives. `None` ends the session.
    async fn wait_frame(&mut self) -> Option<ChannelFrame>;

    /// Deliver one frame of received audio to the channel.
    async fn emit_frame(&mut self, frame: &ChannelFrame) -> BridgeResult<()>;
}
