//! # Bridge Core
//!
//! The bridging loop between a telephony channel and a remote WebSocket
//! endpoint.
//!
//! ## Key Components:
//! - **Session Controller** (`session`): handshake, format negotiation, the
//!   steady-state forward loop, and teardown
//! - **Frame Translator** (`translate`): voice frame ↔ binary message
//!   conversion with in-place, bounds-checked payload updates
//! - **Event Notifier** (`notify`): structured control messages (session
//!   start, digit presses) sent as JSON text
//!
//! ## Pacing:
//! The audio path is strictly half-duplex-paced: one binary message is read
//! for every voice frame sent, before the next channel read happens. Nothing
//! buffers or reorders between the two directions, which bounds memory but
//! ties forward latency to the transport round trip.

pub mod notify;
pub mod session;
pub mod translate;
