//! # Tone Synthesis and Demo Channel
//!
//! Signed-linear test audio for driving the bridge without a real telephony
//! host.
//!
//! ## Audio Format:
//! - **Encoding**: 16-bit PCM, little-endian signed integers
//! - **Amplitude**: one eighth of full scale, loud enough to be obvious
//!   without clipping anything downstream
//!
//! `ToneChannel` implements `MediaChannel` on top of the generator: a 20ms
//! tokio interval paces frame production the way a live channel would, so the
//! binary (and the loopback tests) exercise the realtime loop for real.

use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use tokio::time::{Instant, Interval};
use tracing::debug;

use crate::channel::{AudioFormat, ChannelFrame, MediaChannel};
use crate::config::AudioConfig;
use crate::error::BridgeResult;

/// Sine amplitude: 2^16 / 8.
const TONE_AMPLITUDE: f64 = 8192.0;

/// Stateful sine-wave generator producing signed-linear frames.
///
/// Phase continues across frames, so consecutive frames join into one
/// uninterrupted tone.
pub struct ToneGenerator {
    sample_rate: f64,
    frequency: f64,
    pos: usize,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32, frequency: f64) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            frequency,
            pos: 0,
        }
    }

    /// Produce the next `samples` samples as little-endian 16-bit PCM.
    pub fn next_frame(&mut self, samples: usize) -> Vec<u8> {
        let mut buf = vec![0u8; samples * 2];
        let step = std::f64::consts::PI * 2.0 / (self.sample_rate / self.frequency);

        for (i, chunk) in buf.chunks_exact_mut(2).enumerate() {
            let sample = (step * (self.pos + i) as f64).sin() * TONE_AMPLITUDE;
            LittleEndian::write_i16(chunk, sample as i16);
        }

        self.pos += samples;
        buf
    }
}

/// One frame's worth of silence (16-bit samples, all zero).
pub fn silence(samples: usize) -> Vec<u8> {
    vec![0u8; samples * 2]
}

/// A demo media channel that plays a continuous tone and discards (but
/// counts) whatever the remote endpoint sends back.
pub struct ToneChannel {
    name: String,
    read_format: AudioFormat,
    write_format: AudioFormat,
    generator: ToneGenerator,
    frame_samples: usize,
    interval: Interval,
    started: Instant,
    /// Frames still to produce; `None` keeps going until cancelled
    remaining: Option<u64>,
    frames_received: u64,
}

impl ToneChannel {
    pub fn new(name: &str, audio: &AudioConfig) -> Self {
        Self {
            name: name.to_string(),
            read_format: AudioFormat::Slin,
            write_format: AudioFormat::Slin,
            generator: ToneGenerator::new(audio.sample_rate, audio.tone_hz),
            frame_samples: audio.frame_samples(),
            interval: tokio::time::interval(Duration::from_millis(audio.frame_ms as u64)),
            started: Instant::now(),
            remaining: None,
            frames_received: 0,
        }
    }

    /// Hang up after producing a fixed number of frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    /// Frames the remote endpoint delivered back through the bridge.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }
}

impl MediaChannel for ToneChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_format(&self) -> AudioFormat {
        self.read_format
    }

    fn write_format(&self) -> AudioFormat {
        self.write_format
    }

    fn set_read_format(&mut self, format: AudioFormat) -> BridgeResult<()> {
        self.read_format = format;
        Ok(())
    }

    fn set_write_format(&mut self, format: AudioFormat) -> BridgeResult<()> {
        self.write_format = format;
        Ok(())
    }

    async fn wait_frame(&mut self) -> Option<ChannelFrame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None; // scripted hangup
            }
            *remaining -= 1;
        }

        self.interval.tick().await;

        let mut frame = ChannelFrame::voice(self.generator.next_frame(self.frame_samples));
        // Host-side timing hint, stripped again by the session controller.
        frame.delivery = self.started.elapsed();
        Some(frame)
    }

    async fn emit_frame(&mut self, frame: &ChannelFrame) -> BridgeResult<()> {
        self.frames_received += 1;
        debug!(
            "channel {} received {} bytes from the bridge",
            self.name,
            frame.payload.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    fn samples_of(buf: &[u8]) -> Vec<i16> {
        let mut cursor = Cursor::new(buf);
        let mut samples = Vec::new();
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            samples.push(sample);
        }
        samples
    }

    #[test]
    fn test_frame_size_and_amplitude() {
        let mut gen = ToneGenerator::new(8000, 1000.0);
        let frame = gen.next_frame(160);
        assert_eq!(frame.len(), 320);

        let samples = samples_of(&frame);
        assert_eq!(samples.len(), 160);
        // First sample of a sine is zero; the rest stay within amplitude.
        assert_eq!(samples[0], 0);
        assert!(samples.iter().any(|&s| s != 0));
        assert!(samples.iter().all(|&s| (s as f64).abs() <= TONE_AMPLITUDE));
    }

    /// Phase continues across frame boundaries: two half frames equal one
    /// whole frame.
    #[test]
    fn test_phase_continuity() {
        let mut whole = ToneGenerator::new(8000, 1000.0);
        let mut split = ToneGenerator::new(8000, 1000.0);

        let one = whole.next_frame(160);
        let mut two = split.next_frame(80);
        two.extend(split.next_frame(80));

        assert_eq!(one, two);
    }

    #[test]
    fn test_silence_is_zeroed() {
        let buf = silence(160);
        assert_eq!(buf.len(), 320);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_tone_channel_hangs_up_after_limit() {
        let audio = crate::config::AppConfig::default().audio;
        let mut channel = ToneChannel::new("demo", &audio).with_frame_limit(2);

        assert!(channel.wait_frame().await.is_some());
        let frame = channel.wait_frame().await.unwrap();
        assert_eq!(frame.payload.len(), audio.frame_bytes());
        assert!(channel.wait_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_tone_channel_counts_received_frames() {
        let audio = crate::config::AppConfig::default().audio;
        let mut channel = ToneChannel::new("demo", &audio);

        let frame = ChannelFrame::voice(silence(160));
        channel.emit_frame(&frame).await.unwrap();
        channel.emit_frame(&frame).await.unwrap();
        assert_eq!(channel.frames_received(), 2);
    }
}
