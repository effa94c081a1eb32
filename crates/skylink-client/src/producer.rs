//! Producer client: the initiator side of a Skylink session.
//!
//! One cycle is connect, handshake, then stream until something breaks.
//! [`ProducerClient::run`] repeats cycles under a [`RetryPolicy`] until the
//! source is exhausted, the client is cancelled, or the policy gives up.
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ↓                                              │ wait interval
//!   connect ──> handshake ──> stream records ──> failure┘
//!                                  │
//!                                  ├─ source exhausted ──> Ok
//!                                  └─ cancelled ─────────> Ok
//! ```
//!
//! While streaming, any wait longer than `heartbeat_interval` (a slow source
//! or a long send interval) is filled with heartbeat frames so the
//! coordinator's idle timeout never fires on a live producer.

use std::{future::Future, sync::Arc, time::Duration};

use skylink_core::{
    TransportError, channel,
    env::Environment,
    handshake::{self, Handshake, HandshakeConfig},
    keys::KeyProvider,
    transport::Connection,
};
use skylink_proto::{HEARTBEAT_MARKER, Identity, Message, REJECTION_MARKER};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{connector::Connector, error::ClientError, retry::RetryPolicy, source::TelemetrySource};

/// Pause between two records.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Longest silence before a heartbeat goes out.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Producer configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Reconnect behaviour
    pub retry: RetryPolicy,
    /// Pause between two records
    pub send_interval: Duration,
    /// Initiator handshake settings
    pub handshake: HandshakeConfig,
    /// Heartbeat interval (should be < the coordinator's idle timeout / 2)
    pub heartbeat_interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            send_interval: DEFAULT_SEND_INTERVAL,
            handshake: HandshakeConfig::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Totals over a whole [`ProducerClient::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Handshakes that completed
    pub sessions: u32,
    /// Records sealed and handed to the transport
    pub records_sent: u64,
}

/// How a cycle that did not fail ended.
enum CycleEnd {
    SourceExhausted,
    Cancelled,
}

/// A failed cycle, and whether it got past the handshake.
struct CycleFailure {
    authenticated: bool,
    error: ClientError,
}

impl CycleFailure {
    fn before_handshake(error: impl Into<ClientError>) -> Self {
        Self { authenticated: false, error: error.into() }
    }

    fn after_handshake(error: impl Into<ClientError>) -> Self {
        Self { authenticated: true, error: error.into() }
    }
}

/// Producer client.
pub struct ProducerClient<E: Environment, C: Connector> {
    env: E,
    connector: C,
    keys: Arc<dyn KeyProvider>,
    config: ProducerConfig,
    cancel: CancellationToken,
}

impl<E: Environment, C: Connector> ProducerClient<E, C> {
    /// Create a client. Nothing connects until [`run`](Self::run).
    pub fn new(env: E, connector: C, keys: Arc<dyn KeyProvider>, config: ProducerConfig) -> Self {
        Self { env, connector, keys, config, cancel: CancellationToken::new() }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stream every record from `source`, reconnecting on failure.
    ///
    /// # Errors
    ///
    /// - `ClientError::RetriesExhausted` once `max_attempts` consecutive
    ///   cycles failed
    /// - `ClientError::Source` if the source itself fails
    pub async fn run<S: TelemetrySource>(
        &self,
        source: &mut S,
    ) -> Result<ProducerSummary, ClientError> {
        let mut summary = ProducerSummary::default();
        let mut failures: u32 = 0;

        loop {
            match self.run_cycle(source, &mut summary).await {
                Ok(CycleEnd::SourceExhausted) => {
                    info!(records_sent = summary.records_sent, "telemetry source exhausted");
                    return Ok(summary);
                },
                Ok(CycleEnd::Cancelled) => {
                    info!(records_sent = summary.records_sent, "producer cancelled");
                    return Ok(summary);
                },
                Err(CycleFailure { authenticated, error }) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }

                    failures = if authenticated { 1 } else { failures + 1 };
                    warn!(error = %error, failures, "producer cycle failed");

                    if !self.config.retry.allows_retry(failures) {
                        return Err(ClientError::RetriesExhausted { attempts: failures });
                    }
                },
            }

            tokio::select! {
                () = self.cancel.cancelled() => return Ok(summary),
                () = self.env.sleep(self.config.retry.interval) => {},
            }
        }
    }

    async fn run_cycle<S: TelemetrySource>(
        &self,
        source: &mut S,
        summary: &mut ProducerSummary,
    ) -> Result<CycleEnd, CycleFailure> {
        let mut connection = tokio::select! {
            () = self.cancel.cancelled() => return Ok(CycleEnd::Cancelled),
            connection = self.connector.connect() => {
                connection.map_err(CycleFailure::before_handshake)?
            },
        };

        let mut hs = Handshake::initiator(
            Identity::Producer,
            self.keys.auth_key().clone(),
            self.config.handshake.clone(),
            self.env.now(),
        );

        let peer = tokio::select! {
            () = self.cancel.cancelled() => return Ok(CycleEnd::Cancelled),
            peer = handshake::drive(&mut hs, &mut connection, &self.env, None) => {
                peer.map_err(CycleFailure::before_handshake)?
            },
        };

        summary.sessions += 1;
        info!(%peer, "authenticated, streaming telemetry");

        self.stream(&mut connection, source, summary).await
    }

    async fn stream<S: TelemetrySource>(
        &self,
        connection: &mut Connection,
        source: &mut S,
        summary: &mut ProducerSummary,
    ) -> Result<CycleEnd, CycleFailure> {
        loop {
            let Some(next) = self.keep_alive(connection, source.next_record()).await? else {
                return Ok(CycleEnd::Cancelled);
            };
            let Some(record) = next.map_err(CycleFailure::after_handshake)? else {
                return Ok(CycleEnd::SourceExhausted);
            };

            let record = record.normalized();
            let sealed = channel::seal_record(&record, self.keys.channel_key(), &self.env)
                .map_err(CycleFailure::after_handshake)?;
            connection
                .send(Message::Binary(sealed.into()))
                .await
                .map_err(CycleFailure::after_handshake)?;
            summary.records_sent += 1;
            debug!(records_sent = summary.records_sent, "record sent");

            let pause = self.env.sleep(self.config.send_interval);
            if self.keep_alive(connection, pause).await?.is_none() {
                return Ok(CycleEnd::Cancelled);
            }
        }
    }

    /// Wait for `until` on an authenticated connection.
    ///
    /// Sends a heartbeat after every `heartbeat_interval` of waiting and
    /// watches the connection for a rejection or close. `None` means the
    /// client was cancelled first.
    async fn keep_alive<T>(
        &self,
        connection: &mut Connection,
        until: impl Future<Output = T>,
    ) -> Result<Option<T>, CycleFailure> {
        tokio::pin!(until);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(None),
                value = &mut until => return Ok(Some(value)),
                () = self.env.sleep(self.config.heartbeat_interval) => {
                    connection
                        .send(Message::Text(HEARTBEAT_MARKER.to_string()))
                        .await
                        .map_err(CycleFailure::after_handshake)?;
                    debug!("heartbeat sent");
                },
                incoming = connection.recv() => match incoming {
                    Some(Message::Text(text)) if text == REJECTION_MARKER => {
                        return Err(CycleFailure::after_handshake(ClientError::PeerRejected));
                    },
                    Some(_) => {},
                    None => {
                        return Err(CycleFailure::after_handshake(TransportError::Closed));
                    },
                },
            }
        }
    }
}
