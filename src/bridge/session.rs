//! # Session Controller
//!
//! Owns the bridging loop for one channel/transport pair: handshake, format
//! negotiation, the steady-state forward loop, and teardown.
//!
//! ## Session Lifecycle:
//! 1. **Connecting**: the transport handshake has completed; nothing on the
//!    channel has been touched yet
//! 2. **Announcing**: the Hello control event identifies the channel to the
//!    remote endpoint before any audio flows
//! 3. **NegotiatingFormat**: the channel's read/write formats are saved and
//!    both forced to signed linear
//! 4. **Forwarding**: the loop — one channel frame in, one transport round
//!    trip, one channel frame out
//! 5. **Terminated**: the channel hung up, the remote closed, or an error
//!    ended the session
//!
//! Any state can jump straight to `Terminated` on error; `Forwarding` is the
//! only looping state. Whatever the exit path, teardown restores the saved
//! channel formats so the forced signed-linear setting never leaks past the
//! session.
//!
//! ## Error Policy:
//! Applied from the table in `crate::error`: setup and voice-path failures
//! are fatal, digit-notification failures are logged and survived.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bridge::notify::{notify, ControlEvent};
use crate::bridge::translate::{forward_voice, VoiceReply};
use crate::channel::{AudioFormat, FrameKind, MediaChannel};
use crate::config::AppConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::{MessageTransport, WsTransport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Announcing,
    NegotiatingFormat,
    Forwarding,
    Terminated,
}

impl SessionState {
    /// Convert state to string for logging.
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Announcing => "announcing",
            SessionState::NegotiatingFormat => "negotiating_format",
            SessionState::Forwarding => "forwarding",
            SessionState::Terminated => "terminated",
        }
    }
}

/// Counters for one bridge session, returned when the session ends cleanly.
#[derive(Debug, Clone)]
pub struct BridgeStats {
    /// Voice frames sent over the transport
    pub frames_forwarded: u64,

    /// Digit notifications that reached the transport
    pub digits_reported: u64,

    /// Audio bytes sent to the remote endpoint
    pub bytes_sent: u64,

    /// Audio bytes received and emitted back to the channel
    pub bytes_received: u64,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session ended (set during teardown)
    pub ended_at: Option<DateTime<Utc>>,
}

impl BridgeStats {
    fn new() -> Self {
        Self {
            frames_forwarded: 0,
            digits_reported: 0,
            bytes_sent: 0,
            bytes_received: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }
}

/// One active bridge between a channel and a connected transport.
///
/// ## Ownership:
/// The session holds exclusive borrows of both sides for its whole lifetime;
/// no other code can touch the channel's format state or the transport while
/// it runs. Callers normally use [`run_bridge`]; tests drive `advance()`
/// state by state with scripted collaborators.
pub struct BridgeSession<'a, C: MediaChannel, T: MessageTransport> {
    channel: &'a mut C,
    transport: &'a mut T,
    state: SessionState,
    /// (read, write) formats saved before forcing signed linear
    saved_formats: Option<(AudioFormat, AudioFormat)>,
    stats: BridgeStats,
}

impl<'a, C: MediaChannel, T: MessageTransport> BridgeSession<'a, C, T> {
    /// Wrap an already-connected transport and an untouched channel.
    pub fn new(channel: &'a mut C, transport: &'a mut T) -> Self {
        Self {
            channel,
            transport,
            state: SessionState::Connecting,
            saved_formats: None,
            stats: BridgeStats::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Perform one state transition.
    ///
    /// ## Transitions:
    /// - `Connecting → Announcing`: nothing to do, the transport was
    ///   connected before the session was built
    /// - `Announcing → NegotiatingFormat`: send the Hello event (fatal on
    ///   failure, `HandshakeWrite`)
    /// - `NegotiatingFormat → Forwarding`: save formats, force signed linear
    ///   on both directions (fatal on failure, `Format`; teardown rolls back
    ///   whatever was applied)
    /// - `Forwarding → Forwarding | Terminated`: one loop iteration
    ///
    /// On error the session lands in `Terminated`; the caller still must run
    /// teardown (done automatically by [`BridgeSession::run`]).
    pub async fn advance(&mut self) -> BridgeResult<SessionState> {
        let result = match self.state {
            SessionState::Connecting => {
                info!(
                    "Bridging channel {} over connected websocket",
                    self.channel.name()
                );
                Ok(SessionState::Announcing)
            }
            SessionState::Announcing => {
                // A failed announcement is fatal, unlike later signaling.
                notify(&ControlEvent::hello(self.channel.name()), self.transport)
                    .await
                    .map_err(|e| match e {
                        BridgeError::SignalSend(msg) => BridgeError::HandshakeWrite(msg),
                        other => other,
                    })?;
                Ok(SessionState::NegotiatingFormat)
            }
            SessionState::NegotiatingFormat => self.negotiate_formats(),
            SessionState::Forwarding => self.forward_once().await,
            SessionState::Terminated => Ok(SessionState::Terminated),
        };

        match result {
            Ok(next) => {
                if next != self.state {
                    debug!("session state: {} -> {}", self.state.as_str(), next.as_str());
                }
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                self.state = SessionState::Terminated;
                Err(e)
            }
        }
    }

    /// Save the channel's formats and force both directions to signed linear.
    ///
    /// The originals are saved before either set is attempted, so teardown
    /// rolls back a partially applied negotiation too.
    fn negotiate_formats(&mut self) -> BridgeResult<SessionState> {
        let saved = (self.channel.read_format(), self.channel.write_format());
        self.saved_formats = Some(saved);

        self.channel.set_write_format(AudioFormat::Slin)?;
        self.channel.set_read_format(AudioFormat::Slin)?;

        debug!(
            "channel {} forced to slin (was read={}, write={})",
            self.channel.name(),
            saved.0,
            saved.1
        );
        Ok(SessionState::Forwarding)
    }

    /// One iteration of the forward loop.
    ///
    /// The frame is owned for exactly this iteration and dropped on every
    /// exit path.
    async fn forward_once(&mut self) -> BridgeResult<SessionState> {
        let mut frame = match self.channel.wait_frame().await {
            Some(frame) => frame,
            None => {
                debug!("channel {} is gone, ending session", self.channel.name());
                return Ok(SessionState::Terminated);
            }
        };

        // Host timing hints are not replayed; pacing comes from the loop.
        frame.delivery = Duration::ZERO;

        match frame.kind {
            FrameKind::Voice => {
                let sent = frame.payload.len() as u64;
                let outcome = forward_voice(&mut frame, self.transport).await?;
                self.stats.frames_forwarded += 1;
                self.stats.bytes_sent += sent;

                if let VoiceReply::Updated(received) = outcome {
                    self.stats.bytes_received += received as u64;
                    self.channel.emit_frame(&frame).await?;
                }
            }
            FrameKind::Digit(digit) => {
                debug!("DTMF: {}", digit);
                match notify(&ControlEvent::dtmf(digit), self.transport).await {
                    Ok(()) => self.stats.digits_reported += 1,
                    // Signaling is best-effort; the voice path is not.
                    Err(e) if !e.is_fatal() => warn!("{}", e),
                    Err(e) => return Err(e),
                }
            }
            FrameKind::Other => {}
        }

        Ok(SessionState::Forwarding)
    }

    /// Restore the channel's saved formats. Runs on every exit path.
    fn teardown(&mut self) {
        if let Some((read, write)) = self.saved_formats.take() {
            if let Err(e) = self.channel.set_read_format(read) {
                warn!("Could not restore read format on {}: {}", self.channel.name(), e);
            }
            if let Err(e) = self.channel.set_write_format(write) {
                warn!("Could not restore write format on {}: {}", self.channel.name(), e);
            }
        }
        self.stats.ended_at = Some(Utc::now());
    }

    /// Drive the session to completion.
    ///
    /// ## Guarantees:
    /// Teardown (format restoration) runs whether the session ends cleanly,
    /// by remote close, or by any local error.
    pub async fn run(mut self) -> BridgeResult<BridgeStats> {
        let result = self.drive().await;
        self.teardown();

        match result {
            Ok(()) => {
                info!(
                    "Session on {} finished: {} frames forwarded, {} digits reported",
                    self.channel.name(),
                    self.stats.frames_forwarded,
                    self.stats.digits_reported
                );
                Ok(self.stats)
            }
            Err(e) => Err(e),
        }
    }

    async fn drive(&mut self) -> BridgeResult<()> {
        while self.state != SessionState::Terminated {
            self.advance().await?;
        }
        Ok(())
    }
}

/// Bridge one channel to a remote WebSocket endpoint.
///
/// ## Steps:
/// 1. Reject an empty remote address before any I/O (`Config`)
/// 2. Connect with the fixed sub-protocol (`Connect`)
/// 3. Run the session to completion, teardown included
///
/// This is the hosting entry point: it returns its outcome to the caller
/// instead of producing a process exit code.
pub async fn run_bridge<C: MediaChannel>(
    channel: &mut C,
    remote_url: &str,
    config: &AppConfig,
) -> BridgeResult<BridgeStats> {
    if remote_url.trim().is_empty() {
        return Err(BridgeError::Config(
            "a remote websocket URL is required".to_string(),
        ));
    }

    info!("Connecting websocket server at {}", remote_url);

    let read_timeout = match config.bridge.read_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let mut transport = WsTransport::connect(remote_url, read_timeout).await?;

    BridgeSession::new(channel, &mut transport).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testutil::{ScriptedChannel, ScriptedTransport};
    use crate::channel::ChannelFrame;
    use crate::transport::{Opcode, TransportMessage};

    fn voice_frame(len: usize) -> ChannelFrame {
        let mut frame = ChannelFrame::voice(vec![0x22u8; len]);
        frame.delivery = Duration::from_millis(120); // host timing hint
        frame
    }

    #[tokio::test]
    async fn test_states_advance_in_order() {
        let mut channel = ScriptedChannel::new("demo", Vec::new());
        let mut transport = ScriptedTransport::new(Vec::new());
        let mut session = BridgeSession::new(&mut channel, &mut transport);

        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.advance().await.unwrap(), SessionState::Announcing);
        assert_eq!(
            session.advance().await.unwrap(),
            SessionState::NegotiatingFormat
        );
        assert_eq!(session.advance().await.unwrap(), SessionState::Forwarding);
        // Empty frame script: the channel is gone, the loop ends cleanly.
        assert_eq!(session.advance().await.unwrap(), SessionState::Terminated);
    }

    /// One voice frame out, one binary reply in, emitted back to the channel
    /// with the host timing hint stripped.
    #[tokio::test]
    async fn test_voice_round_trip() {
        let mut channel = ScriptedChannel::new("SIP/100-0001", vec![voice_frame(4)]);
        let reply_payload = vec![7u8, 6, 5, 4];
        let mut transport = ScriptedTransport::new(vec![Ok(TransportMessage::binary(
            reply_payload.clone(),
        ))]);

        let stats = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.frames_forwarded, 1);
        assert_eq!(stats.bytes_sent, 4);
        assert_eq!(stats.bytes_received, 4);
        assert!(stats.ended_at.is_some());

        // Hello went out first, as text, before any audio.
        assert_eq!(transport.sent[0].opcode, Opcode::Text);
        assert_eq!(
            transport.sent_text()[0],
            r#"{"Event":"Hello","Channel":"SIP/100-0001"}"#
        );
        assert_eq!(transport.sent[1].opcode, Opcode::Binary);

        // The channel got the reply payload with zeroed delivery.
        assert_eq!(channel.emitted.len(), 1);
        assert_eq!(channel.emitted[0].payload, reply_payload);
        assert_eq!(channel.emitted[0].delivery, Duration::ZERO);
    }

    /// Formats come back to their pre-session values on the clean path.
    #[tokio::test]
    async fn test_formats_restored_after_clean_exit() {
        let mut channel = ScriptedChannel::new("demo", Vec::new());
        let original = (channel.read_format, channel.write_format);
        let mut transport = ScriptedTransport::new(Vec::new());

        BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap();

        assert_eq!((channel.read_format, channel.write_format), original);
    }

    /// A close reply ends the session fatally and still restores formats.
    #[tokio::test]
    async fn test_remote_close_is_fatal_and_restores_formats() {
        let mut channel = ScriptedChannel::new("demo", vec![voice_frame(4)]);
        let original = (channel.read_format, channel.write_format);
        let mut transport = ScriptedTransport::new(vec![Ok(TransportMessage::close())]);

        let err = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::RemoteClosed(_)));
        assert_eq!((channel.read_format, channel.write_format), original);
        assert!(channel.emitted.is_empty());
    }

    /// A failed digit notification is survived; the next frame is processed
    /// normally.
    #[tokio::test]
    async fn test_digit_send_failure_does_not_end_session() {
        let mut channel = ScriptedChannel::new(
            "demo",
            vec![ChannelFrame::digit('5'), voice_frame(4)],
        );
        let mut transport =
            ScriptedTransport::new(vec![Ok(TransportMessage::binary(vec![1, 2, 3, 4]))]);
        // Let the Hello through, fail every text send after it.
        transport.text_send_budget = Some(1);

        let stats = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.digits_reported, 0);
        assert_eq!(stats.frames_forwarded, 1);
        assert_eq!(channel.emitted.len(), 1);
    }

    /// A successful digit notification shows up on the wire and in the stats.
    #[tokio::test]
    async fn test_digit_notification_wire_format() {
        let mut channel = ScriptedChannel::new("demo", vec![ChannelFrame::digit('#')]);
        let mut transport = ScriptedTransport::new(Vec::new());

        let stats = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.digits_reported, 1);
        assert_eq!(
            transport.sent_text()[1],
            r##"{"Event":"DTMF","Digit":"#"}"##
        );
    }

    /// Hello failure aborts before the channel's formats are touched.
    #[tokio::test]
    async fn test_hello_failure_aborts_before_negotiation() {
        let mut channel = ScriptedChannel::new("demo", vec![voice_frame(4)]);
        let mut transport = ScriptedTransport::new(Vec::new());
        transport.text_send_budget = Some(0);

        let err = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::HandshakeWrite(_)));
        // Negotiation never ran: formats keep their scripted defaults.
        assert_eq!(channel.read_format, AudioFormat::Ulaw);
        assert_eq!(channel.write_format, AudioFormat::Alaw);
    }

    /// A read-format failure rolls back the already-applied write format.
    #[tokio::test]
    async fn test_partial_negotiation_is_rolled_back() {
        let mut channel = ScriptedChannel::new("demo", vec![voice_frame(4)]);
        channel.fail_set_read = true;
        let mut transport = ScriptedTransport::new(Vec::new());

        let err = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Format(_)));
        // The write side had been forced to slin; teardown put it back.
        assert_eq!(channel.write_format, AudioFormat::Alaw);
        assert_eq!(channel.read_format, AudioFormat::Ulaw);
    }

    /// Channel refusing the inbound frame is fatal.
    #[tokio::test]
    async fn test_emit_failure_is_fatal() {
        let mut channel = ScriptedChannel::new("demo", vec![voice_frame(4)]);
        channel.fail_emit = true;
        let original = (channel.read_format, channel.write_format);
        let mut transport =
            ScriptedTransport::new(vec![Ok(TransportMessage::binary(vec![0; 4]))]);

        let err = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Emit(_)));
        assert_eq!((channel.read_format, channel.write_format), original);
    }

    /// Text replies on the voice path skip the update; the loop keeps going.
    #[tokio::test]
    async fn test_text_reply_skips_emission() {
        let mut channel =
            ScriptedChannel::new("demo", vec![voice_frame(4), voice_frame(4)]);
        let mut transport = ScriptedTransport::new(vec![
            Ok(TransportMessage::text("ok".to_string())),
            Ok(TransportMessage::binary(vec![9, 9, 9, 9])),
        ]);

        let stats = BridgeSession::new(&mut channel, &mut transport)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.frames_forwarded, 2);
        assert_eq!(channel.emitted.len(), 1);
        assert_eq!(channel.emitted[0].payload, vec![9, 9, 9, 9]);
    }

    /// An empty remote address fails before any connection attempt.
    #[tokio::test]
    async fn test_empty_url_is_a_config_error() {
        let mut channel = ScriptedChannel::new("demo", Vec::new());
        let config = AppConfig::default();

        let err = run_bridge(&mut channel, "", &config).await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));

        let err = run_bridge(&mut channel, "   ", &config).await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
