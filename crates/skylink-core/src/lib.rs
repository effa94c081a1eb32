//! Skylink protocol core.
//!
//! Everything both ends of a Skylink connection share: the identity token and
//! challenge-response codecs, the secure channel used for telemetry, the
//! handshake state machine, and the connection abstraction the drivers run
//! on.
//!
//! # Architecture
//!
//! The handshake follows the Sans-IO pattern. [`handshake::Handshake`] never
//! touches a socket: it takes a message plus an [`env::Environment`] (for the
//! wall clock and randomness) and returns [`handshake::HandshakeAction`]s.
//! [`handshake::drive`] is the thin async loop that executes those actions
//! over a [`transport::Connection`], enforcing the handshake deadline.
//!
//! ```text
//!   Initiator (producer)                    Responder (coordinator)
//!   ────────────────────                    ───────────────────────
//!   token(producer)        ───────────────>  verify token
//!                          <───────────────  CHALLENGE:<hex>
//!   respond(challenge)     ───────────────>  verify response
//!                          <───────────────  token(coordinator)
//!   verify token
//!   AUTH_OK                ───────────────>  session established
//! ```
//!
//! Any failure on the responder side is answered with the opaque
//! `AUTH_FAILED` marker, regardless of the cause.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod channel;
pub mod env;
pub mod error;
pub mod handshake;
pub mod keys;
mod system_env;
pub mod transport;

pub use error::{AuthError, ChannelError, HandshakeError, KeyError, TransportError};
pub use system_env::SystemEnv;
