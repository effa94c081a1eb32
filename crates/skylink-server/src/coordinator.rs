//! Session coordinator.
//!
//! Owns the singleton producer session and the subscriber registry. Each
//! accepted connection is handed to [`Coordinator::serve`], which decides what
//! the peer is from its first message:
//!
//! - a text message shaped like an identity token starts the responder
//!   handshake. On success the connection becomes the producer and every
//!   envelope it sends is opened and fanned out. A producer that stays silent
//!   for `producer_idle_timeout` is dropped; heartbeats count as traffic.
//! - anything else, including silence for `classify_timeout`, makes it a
//!   subscriber. Subscribers only receive records and are never
//!   authenticated.
//!
//! Subscriber-side failures are isolated: a subscriber that cannot take a
//! record within `fanout_timeout` is pruned and its task cancelled, while the
//! others still receive it.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::future::join_all;
use serde::Serialize;
use skylink_core::{
    HandshakeError, channel,
    env::Environment,
    handshake::{self, Handshake, HandshakeConfig},
    keys::KeyProvider,
    transport::Connection,
};
use skylink_proto::{ControlMessage, HEARTBEAT_MARKER, Identity, Message, TelemetryRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::CoordinatorError,
    registry::{SubscriberHandle, SubscriberId, SubscriberRegistry},
    session::{ProducerLease, ProducerSlot},
};

/// How long a new connection has to identify itself as a producer.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(1);

/// How long one subscriber may take to accept a record.
pub const DEFAULT_FANOUT_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum silence from an authenticated producer before its session is
/// dropped. Producers send a record or a heartbeat well inside this.
pub const DEFAULT_PRODUCER_IDLE_TIMEOUT: Duration = Duration::from_secs(20);

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Responder handshake settings
    pub handshake: HandshakeConfig,
    /// Wait for a first message before treating a peer as a subscriber
    pub classify_timeout: Duration,
    /// Per-subscriber delivery deadline during fan-out
    pub fanout_timeout: Duration,
    /// Close the producer session after this long without any frame
    pub producer_idle_timeout: Duration,
    /// Tear the producer session down after this many undecryptable envelopes
    /// in a row. `None` drops them forever.
    pub max_consecutive_decrypt_failures: Option<u32>,
    /// Drop records sealed longer ago than this. `None` disables the check.
    pub max_record_age: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            fanout_timeout: DEFAULT_FANOUT_TIMEOUT,
            producer_idle_timeout: DEFAULT_PRODUCER_IDLE_TIMEOUT,
            max_consecutive_decrypt_failures: None,
            max_record_age: None,
        }
    }
}

/// Health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    /// Whether an authenticated producer holds the session slot
    pub producer_connected: bool,
    /// Number of registered subscribers
    pub active_subscribers: usize,
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the record
    pub delivered: usize,
    /// Subscribers removed because delivery failed or timed out
    pub pruned: usize,
}

/// Session coordinator.
///
/// Shared between connection tasks behind an `Arc`.
pub struct Coordinator<E: Environment> {
    env: E,
    keys: Arc<dyn KeyProvider>,
    config: CoordinatorConfig,
    producer: ProducerSlot,
    subscribers: Mutex<SubscriberRegistry>,
    shutdown: CancellationToken,
}

impl<E: Environment> Coordinator<E> {
    /// Create a coordinator with no producer and no subscribers.
    pub fn new(env: E, keys: Arc<dyn KeyProvider>, config: CoordinatorConfig) -> Self {
        Self {
            env,
            keys,
            config,
            producer: ProducerSlot::new(),
            subscribers: Mutex::new(SubscriberRegistry::new()),
            shutdown: CancellationToken::new(),
        }
    }

    fn registry(&self) -> MutexGuard<'_, SubscriberRegistry> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current health snapshot.
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            producer_connected: self.producer.is_occupied(),
            active_subscribers: self.registry().len(),
        }
    }

    /// Stop serving: ends the producer session and every subscriber task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.registry().clear();
    }

    /// Serve one connection until it closes.
    ///
    /// # Errors
    ///
    /// Reports why a producer connection ended abnormally. Subscriber
    /// connections always end with `Ok`.
    pub async fn serve(&self, mut connection: Connection) -> Result<(), CoordinatorError> {
        let first =
            match tokio::time::timeout(self.config.classify_timeout, connection.recv()).await {
                Ok(Some(message)) => Some(message),
                Ok(None) => {
                    debug!("connection closed before identifying itself");
                    return Ok(());
                },
                Err(_) => None,
            };

        match first {
            Some(Message::Text(text)) if ControlMessage::is_token(&text) => {
                self.serve_producer(connection, Message::Text(text)).await
            },
            _ => {
                self.serve_subscriber(connection).await;
                Ok(())
            },
        }
    }

    async fn serve_producer(
        &self,
        mut connection: Connection,
        first: Message,
    ) -> Result<(), CoordinatorError> {
        if self.producer.is_occupied() {
            warn!("rejecting producer: a session is already active");
            handshake::send_rejection(&connection).await;
            return Err(CoordinatorError::DuplicateProducer);
        }

        let mut hs = Handshake::responder(
            Identity::Coordinator,
            self.keys.auth_key().clone(),
            self.config.handshake.clone(),
            self.env.now(),
        );

        // Two handshakes may be in flight together. The slot is claimed as
        // soon as the response verifies, before our token goes out, so the
        // loser is rejected before it can confirm.
        let mut claimed = None;
        let admit = |peer| match self.producer.try_claim(peer, self.env.wall_clock_secs()) {
            Ok(lease) => {
                claimed = Some(lease);
                true
            },
            Err(_) => false,
        };

        let outcome =
            handshake::drive_with(&mut hs, &mut connection, &self.env, Some(first), admit).await;

        let (peer, lease) = match (outcome, claimed) {
            (Ok(peer), Some(lease)) => (peer, lease),
            (Err(HandshakeError::NotAdmitted), _) => {
                warn!("rejecting producer: lost the race for the session slot");
                return Err(CoordinatorError::DuplicateProducer);
            },
            (Err(e), _) => {
                warn!(error = %e, "producer handshake failed");
                return Err(e.into());
            },
            (Ok(_), None) => {
                warn!("handshake established without claiming the session slot");
                handshake::send_rejection(&connection).await;
                return Err(CoordinatorError::DuplicateProducer);
            },
        };

        info!(session_id = lease.session_id(), %peer, "producer authenticated");
        let result = self.producer_loop(&mut connection, &lease).await;
        info!(session_id = lease.session_id(), "producer session ended");

        result
    }

    async fn producer_loop(
        &self,
        connection: &mut Connection,
        lease: &ProducerLease,
    ) -> Result<(), CoordinatorError> {
        let mut consecutive_failures: u32 = 0;

        loop {
            let idle = self.config.producer_idle_timeout;
            let message = tokio::select! {
                message = connection.recv() => message,
                () = self.shutdown.cancelled() => return Ok(()),
                () = self.env.sleep(idle) => {
                    warn!(session_id = lease.session_id(), ?idle, "producer went silent");
                    return Err(CoordinatorError::ProducerIdle { idle });
                },
            };

            let sealed = match message {
                Some(Message::Binary(sealed)) => sealed,
                Some(Message::Text(text)) if text == HEARTBEAT_MARKER => continue,
                Some(Message::Text(_)) => {
                    debug!(session_id = lease.session_id(), "ignoring text frame from producer");
                    continue;
                },
                None => return Ok(()),
            };

            let opened = match channel::open_record(&sealed, self.keys.channel_key()) {
                Ok(opened) => {
                    consecutive_failures = 0;
                    opened
                },
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        session_id = lease.session_id(),
                        error = %e,
                        consecutive_failures,
                        "dropping envelope"
                    );

                    match self.config.max_consecutive_decrypt_failures {
                        Some(max) if consecutive_failures >= max => {
                            return Err(CoordinatorError::TooManyDecryptFailures {
                                count: consecutive_failures,
                            });
                        },
                        _ => continue,
                    }
                },
            };

            if let Some(max_age) = self.config.max_record_age {
                let age = opened.age(self.env.wall_clock_secs());
                if age > max_age {
                    debug!(age_secs = age.as_secs(), "dropping stale record");
                    continue;
                }
            }

            if let Err(e) = opened.record.validate() {
                warn!(error = %e, "dropping invalid record");
                continue;
            }

            let report = self.broadcast(&opened.record).await;
            debug!(delivered = report.delivered, pruned = report.pruned, "record fanned out");
        }
    }

    async fn serve_subscriber(&self, mut connection: Connection) {
        let cancel = self.shutdown.child_token();
        let id = self.registry().register(SubscriberHandle {
            sender: connection.sender(),
            cancel: cancel.clone(),
        });
        info!(subscriber = id, "subscriber connected");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = connection.recv() => match message {
                    // Subscribers have nothing to say to the producer.
                    Some(_) => continue,
                    None => break,
                },
            }
        }

        self.registry().remove(id);
        info!(subscriber = id, "subscriber disconnected");
    }

    /// Deliver one record to every current subscriber as JSON text.
    ///
    /// Deliveries run concurrently, each bounded by `fanout_timeout`.
    /// Subscribers that fail are removed after the pass and their tasks
    /// cancelled.
    pub async fn broadcast(&self, record: &TelemetryRecord) -> BroadcastReport {
        let json = match record.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "record does not serialize, not broadcasting");
                return BroadcastReport::default();
            },
        };

        let snapshot = self.registry().snapshot();
        let timeout = self.config.fanout_timeout;

        let deliveries = snapshot.into_iter().map(|(id, handle)| {
            let message = Message::Text(json.clone());
            async move {
                let outcome = tokio::time::timeout(timeout, handle.sender.send(message)).await;
                (id, matches!(outcome, Ok(Ok(()))))
            }
        });

        let results = join_all(deliveries).await;
        let delivered = results.iter().filter(|(_, ok)| *ok).count();
        let failed: Vec<SubscriberId> =
            results.into_iter().filter(|(_, ok)| !ok).map(|(id, _)| id).collect();

        let pruned = self.prune(&failed);
        BroadcastReport { delivered, pruned }
    }

    fn prune(&self, failed: &[SubscriberId]) -> usize {
        if failed.is_empty() {
            return 0;
        }

        let mut registry = self.registry();
        let mut pruned = 0;
        for id in failed {
            if let Some(handle) = registry.remove(*id) {
                handle.cancel.cancel();
                pruned += 1;
                info!(subscriber = id, "pruned unresponsive subscriber");
            }
        }
        pruned
    }
}
