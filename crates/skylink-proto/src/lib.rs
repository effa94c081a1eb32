//! Skylink Protocol
//!
//! Wire vocabulary shared by the producer, the coordinator and subscribers.
//! Pure data types with no I/O and no cryptography: the codecs that sign,
//! verify and seal live in `skylink-crypto` and `skylink-core`.
//!
//! # Message Kinds
//!
//! The transport delivers discrete messages that are either text or binary:
//!
//! ```text
//! Text   ── handshake control: tokens, challenges, responses, markers
//!        └─ subscriber-facing telemetry records (JSON)
//! Binary ── sealed telemetry envelopes (producer → coordinator)
//! ```
//!
//! Control messages are plain strings so that both ends can be inspected with
//! ordinary WebSocket tooling. Their meaning depends on the handshake state,
//! see [`ControlMessage::parse`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod control;
pub mod errors;
mod identity;
mod message;
mod telemetry;

pub use control::{
    CHALLENGE_PREFIX, CONFIRMATION_MARKER, ControlMessage, HEARTBEAT_MARKER, REJECTION_MARKER,
};
pub use errors::{ProtocolError, Result};
pub use identity::Identity;
pub use message::Message;
pub use telemetry::{FlightStatus, TelemetryRecord};
