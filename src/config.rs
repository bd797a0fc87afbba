//! # Configuration Management
//!
//! This module handles loading and managing bridge configuration from
//! multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with AUDIOWS_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. The remote URL given as a command-line argument (handled in main)
//! 2. Environment variables (AUDIOWS_URL, AUDIOWS_BRIDGE__..., etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (bridge, audio) keeps the
/// transport-facing knobs apart from the media-format knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub audio: AudioConfig,
}

/// Settings for the WebSocket side of the bridge.
///
/// ## Fields:
/// - `remote_url`: WebSocket server to send channel audio to
///   (e.g., "ws://localhost:8080/echo"). Usually supplied as the invocation
///   argument instead; the config value is a fallback.
/// - `read_timeout_ms`: bound on each voice-path read. The original behavior
///   is an indefinite blocking wait, so the default is 0 (unbounded); a
///   non-zero value converts an expired wait into a read error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub remote_url: String,
    pub read_timeout_ms: u64,
}

/// Audio format settings for the channel side of the bridge.
///
/// ## Fields:
/// - `sample_rate`: samples per second of the signed-linear stream (8000 for
///   narrowband telephony)
/// - `channels`: channel count (the bridge only handles mono)
/// - `bit_depth`: sample width (the bridge only handles 16-bit PCM)
/// - `frame_ms`: duration of one voice frame in milliseconds (20ms is the
///   standard telephony packetization)
/// - `tone_hz`: frequency of the demo channel's test tone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub frame_ms: u32,
    pub tone_hz: f64,
}

impl AudioConfig {
    /// Number of samples in one voice frame.
    ///
    /// ## Example:
    /// 8000 Hz at 20ms per frame: 8000 * 20 / 1000 = 160 samples.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize) / 1000
    }

    /// Number of bytes in one voice frame (16-bit samples).
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * 2
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig {
                remote_url: String::new(), // must come from the argument or env
                read_timeout_ms: 0,        // unbounded, matching the original wait
            },
            audio: AudioConfig {
                sample_rate: 8000, // narrowband signed linear
                channels: 1,
                bit_depth: 16,
                frame_ms: 20,
                tone_hz: 1000.0,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with AUDIOWS_
    /// 4. Handle the bare AUDIOWS_URL variable as a shortcut for the
    ///    remote address
    ///
    /// ## Environment Variable Examples:
    /// - `AUDIOWS_URL=ws://localhost:8080/echo`: set the remote address
    /// - `AUDIOWS_BRIDGE__READ_TIMEOUT_MS=5000`: bound voice-path reads
    /// - `AUDIOWS_AUDIO__TONE_HZ=440`: change the demo tone
    ///
    /// The section separator is a double underscore so single underscores
    /// stay available for field names like `read_timeout_ms`.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists)
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with AUDIOWS_ prefix
            .add_source(
                config::Environment::with_prefix("AUDIOWS")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Shortcut variable for the one setting everyone needs to change
        if let Ok(url) = env::var("AUDIOWS_URL") {
            settings = settings.set_override("bridge.remote_url", url)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Audio settings describe the one fixed format the bridge speaks
    ///   (mono 16-bit signed linear)
    /// - Frame timing yields a non-empty frame
    ///
    /// The remote URL is deliberately NOT validated here: it may legitimately
    /// be empty in config when supplied as the invocation argument instead.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(anyhow::anyhow!("Sample rate cannot be 0"));
        }

        if self.audio.channels != 1 {
            return Err(anyhow::anyhow!("Only mono audio is supported"));
        }

        if self.audio.bit_depth != 16 {
            return Err(anyhow::anyhow!("Only 16-bit signed linear audio is supported"));
        }

        if self.audio.frame_ms == 0 || self.audio.frame_samples() == 0 {
            return Err(anyhow::anyhow!("Frame duration must yield at least one sample"));
        }

        if self.audio.tone_hz <= 0.0 {
            return Err(anyhow::anyhow!("Tone frequency must be positive"));
        }

        Ok(())
    }
}
