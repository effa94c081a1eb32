//! Skylink producer client.
//!
//! The initiator side of a Skylink session: connect to the coordinator,
//! authenticate, then seal and stream telemetry records, reconnecting with a
//! fresh handshake whenever the session breaks.
//!
//! # Components
//!
//! - [`ProducerClient`]: connect/handshake/stream loop with retry
//! - [`RetryPolicy`]: fixed-interval reconnect with optional attempt limit
//! - [`Connector`]: how a connection is opened ([`WebSocketConnector`] in
//!   production, in-memory pairs in tests)
//! - [`TelemetrySource`]: where records come from ([`IterSource`],
//!   [`JsonLinesSource`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connector;
mod error;
mod producer;
mod retry;
mod source;

pub use connector::{Connector, WebSocketConnector};
pub use error::ClientError;
pub use producer::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SEND_INTERVAL, ProducerClient, ProducerConfig,
    ProducerSummary,
};
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};
pub use skylink_core::env::Environment;
pub use source::{IterSource, JsonLinesSource, TelemetrySource};
