//! # AudioWS Bridge - Main Application Entry Point
//!
//! Transmits and receives audio between a telephony-style channel and a
//! remote WebSocket server. Channel audio goes out as binary messages; audio
//! received from the socket is written back to the channel. Only voice frames
//! carry audio; digit presses travel as JSON control events.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **error**: the bridge error taxonomy and propagation policy
//! - **channel**: the host channel abstraction the bridge consumes
//! - **transport**: the WebSocket message transport
//! - **synth**: tone synthesis and the demo channel driven by this binary
//! - **bridge**: session controller, frame translator, event notifier

mod bridge;
mod channel;
mod config;
mod error;
mod synth;
mod transport;

use anyhow::Result;
use config::AppConfig;
use synth::ToneChannel;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Resolves the remote URL** (argument first, config fallback)
/// 4. **Runs one bridge session** on a demo tone channel, racing a Ctrl+C
///    shutdown signal — cancellation is external to the session itself
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audiows-bridge v{}", env!("CARGO_PKG_VERSION"));

    // The invocation argument takes precedence over the configured URL; an
    // empty result is rejected by the session before any connection attempt.
    let remote_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.bridge.remote_url.clone());

    let mut channel = ToneChannel::new("demo-tone", &config.audio);

    tokio::select! {
        result = bridge::session::run_bridge(&mut channel, &remote_url, &config) => {
            match result {
                Ok(stats) => {
                    info!(
                        "Bridge finished: {} frames forwarded, {} bytes received",
                        stats.frames_forwarded, stats.bytes_received
                    );
                }
                Err(e) => {
                    error!("{}", e);
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, ending session");
        }
    }

    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug",
///   "audiows_bridge=debug"); defaults to debug for this crate and info for
///   the websocket stack.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiows_bridge=debug,tungstenite=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
