//! Mutual authentication handshake.
//!
//! Uses the action pattern: methods take the incoming message plus an
//! [`Environment`] (for the wall clock and randomness) and return
//! [`HandshakeAction`]s for the driver to execute. No I/O happens here, so
//! every transition is testable without sockets or timers.
//!
//! # State Machine
//!
//! ```text
//!   Initiator                              Responder
//!
//!   Start                                  Start
//!     │ start: send token                    │ start
//!     ↓                                      ↓
//!   LocalTokenSent                         AwaitingPeerToken
//!     │ challenge: send response             │ token: send challenge
//!     ↓                                      ↓
//!   AwaitingPeerToken                      AwaitingResponse
//!     │ token: send AUTH_OK                  │ response: admit, send own token
//!     ↓                                      ↓
//!   Confirmed                              PeerTokenExchanged
//!                                            │ AUTH_OK
//!                                            ↓
//!                                          Confirmed
//!
//! Any failed check, malformed or binary message, unexpected message, peer
//! rejection or timeout moves either role to Rejected.
//! ```
//!
//! The responder answers every failure with the opaque rejection marker
//! ([`HandshakeAction::Reject`]). The initiator just closes
//! ([`HandshakeAction::Close`]).
//!
//! Before the responder reveals its own token it emits
//! [`HandshakeAction::Admit`], letting the caller refuse a verified peer
//! (the coordinator claims its producer slot there).

mod driver;

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

pub use driver::{drive, drive_with, send_rejection};
use skylink_crypto::AuthKey;
use skylink_proto::{ControlMessage, Identity, Message};

use crate::{
    auth::{self, Challenge, DEFAULT_TOKEN_WINDOW_SECS},
    env::Environment,
    error::HandshakeError,
};

/// Time allowed for the whole exchange, from `start` to `Confirmed`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Which side of the exchange this machine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// Opens with its own token (the producer)
    Initiator,
    /// Verifies the opening token and issues the challenge (the coordinator)
    Responder,
}

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Not started
    Start,
    /// Initiator sent its token, waiting for a challenge
    LocalTokenSent,
    /// Waiting for the peer's token
    AwaitingPeerToken,
    /// Responder issued a challenge, waiting for the response
    AwaitingResponse,
    /// Responder sent its own token, waiting for confirmation
    PeerTokenExchanged,
    /// Both sides authenticated
    Confirmed,
    /// Handshake failed
    Rejected,
}

impl HandshakeState {
    /// Whether no further messages are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

/// Actions returned by the handshake state machine.
///
/// The driver executes these in order:
/// - `Send`: write the control message as a text frame
/// - `Admit`: ask the caller whether to accept the verified peer
/// - `Reject`: write the rejection marker, then close
/// - `Close`: close without writing anything
/// - `Established`: the session is authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send this control message to the peer
    Send(ControlMessage),
    /// Peer proved possession of the key. The responder has not revealed its
    /// own token yet; refusing here rejects the peer before it can finish.
    Admit {
        /// Verified identity of the peer
        peer: Identity,
    },
    /// Send the rejection marker and close. The error stays local.
    Reject(HandshakeError),
    /// Close without a marker
    Close(HandshakeError),
    /// Mutual authentication succeeded
    Established {
        /// Authenticated identity of the peer
        peer: Identity,
    },
}

/// Handshake configuration
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Deadline for the whole exchange
    pub timeout: Duration,
    /// Accepted clock difference for tokens, in seconds
    pub token_window_secs: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_HANDSHAKE_TIMEOUT, token_window_secs: DEFAULT_TOKEN_WINDOW_SECS }
    }
}

/// Handshake state machine
///
/// One instance per connection attempt. Never reused: a retry builds a new
/// machine, which draws a new challenge.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug)]
pub struct Handshake<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    role: HandshakeRole,
    state: HandshakeState,
    local: Identity,
    key: AuthKey,
    config: HandshakeConfig,
    started_at: I,
    /// Present only while the responder waits for the response.
    challenge: Option<Challenge>,
}

impl<I> Handshake<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create the initiating side, authenticating as `local`.
    pub fn initiator(local: Identity, key: AuthKey, config: HandshakeConfig, now: I) -> Self {
        Self::new(HandshakeRole::Initiator, local, key, config, now)
    }

    /// Create the responding side, authenticating as `local`.
    pub fn responder(local: Identity, key: AuthKey, config: HandshakeConfig, now: I) -> Self {
        Self::new(HandshakeRole::Responder, local, key, config, now)
    }

    fn new(
        role: HandshakeRole,
        local: Identity,
        key: AuthKey,
        config: HandshakeConfig,
        now: I,
    ) -> Self {
        Self {
            role,
            state: HandshakeState::Start,
            local,
            key,
            config,
            started_at: now,
            challenge: None,
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Role of this side
    pub fn role(&self) -> HandshakeRole {
        self.role
    }

    /// Identity the peer must prove.
    pub fn peer(&self) -> Identity {
        self.local.counterpart()
    }

    /// Whether mutual authentication completed.
    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Confirmed
    }

    /// Time left before the deadline. Zero once it has passed.
    pub fn time_remaining(&self, now: I) -> Duration {
        self.config.timeout.saturating_sub(now - self.started_at)
    }

    /// Elapsed time since start, if the deadline passed in a non-terminal
    /// state. `None` otherwise.
    pub fn check_timeout(&self, now: I) -> Option<Duration> {
        if self.state.is_terminal() {
            return None;
        }

        let elapsed = now - self.started_at;
        if elapsed >= self.config.timeout { Some(elapsed) } else { None }
    }

    /// Fail the handshake if its deadline has passed.
    pub fn tick(&mut self, now: I) -> Vec<HandshakeAction> {
        match self.check_timeout(now) {
            Some(elapsed) => self.fail(HandshakeError::Timeout { elapsed }),
            None => Vec::new(),
        }
    }

    /// Begin the exchange.
    ///
    /// The initiator sends its token stamped with `wall_clock_secs`. The
    /// responder just starts waiting for one.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::InvalidState` if not in Start state
    pub fn start(&mut self, wall_clock_secs: u64) -> Result<Vec<HandshakeAction>, HandshakeError> {
        if self.state != HandshakeState::Start {
            return Err(HandshakeError::InvalidState { state: self.state, operation: "start" });
        }

        match self.role {
            HandshakeRole::Initiator => {
                let token = auth::issue(self.local, &self.key, wall_clock_secs);
                self.state = HandshakeState::LocalTokenSent;
                Ok(vec![HandshakeAction::Send(ControlMessage::Token(token.encode()))])
            },
            HandshakeRole::Responder => {
                self.state = HandshakeState::AwaitingPeerToken;
                Ok(Vec::new())
            },
        }
    }

    /// Abandon the attempt, e.g. because the transport closed.
    ///
    /// No-op in a terminal state.
    pub fn abort(&mut self, error: HandshakeError) -> Vec<HandshakeAction> {
        if self.state.is_terminal() { Vec::new() } else { self.fail(error) }
    }

    /// Process one message from the peer.
    ///
    /// Protocol failures are returned as `Reject`/`Close` actions, not as
    /// errors, so the driver handles them uniformly.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::InvalidState` if called before `start` or after a
    ///   terminal state
    pub fn handle_message<E>(
        &mut self,
        message: &Message,
        env: &E,
    ) -> Result<Vec<HandshakeAction>, HandshakeError>
    where
        E: Environment<Instant = I>,
    {
        if self.state == HandshakeState::Start || self.state.is_terminal() {
            return Err(HandshakeError::InvalidState {
                state: self.state,
                operation: "handle_message",
            });
        }

        let Some(text) = message.as_text() else {
            return Ok(self.unexpected("binary"));
        };
        let Ok(control) = ControlMessage::parse(text) else {
            return Ok(self.unexpected("malformed"));
        };

        if control == ControlMessage::Rejected {
            self.state = HandshakeState::Rejected;
            self.challenge = None;
            return Ok(vec![HandshakeAction::Close(HandshakeError::Rejected)]);
        }

        match self.role {
            HandshakeRole::Initiator => Ok(self.initiator_step(control, env)),
            HandshakeRole::Responder => Ok(self.responder_step(control, env)),
        }
    }

    fn initiator_step<E>(&mut self, control: ControlMessage, env: &E) -> Vec<HandshakeAction>
    where
        E: Environment<Instant = I>,
    {
        match (self.state, control) {
            (HandshakeState::LocalTokenSent, ControlMessage::Challenge(hex)) => {
                let Some(challenge) = Challenge::from_hex(&hex) else {
                    return self.unexpected("challenge");
                };

                let response = auth::respond(&challenge, self.local, &self.key);
                self.state = HandshakeState::AwaitingPeerToken;

                vec![HandshakeAction::Send(ControlMessage::Response(response.to_hex()))]
            },

            (HandshakeState::AwaitingPeerToken, ControlMessage::Token(token)) => {
                if let Err(e) = self.verify_peer_token(&token, env) {
                    return self.fail(e);
                }

                self.state = HandshakeState::Confirmed;

                vec![
                    HandshakeAction::Send(ControlMessage::Confirmed),
                    HandshakeAction::Established { peer: self.peer() },
                ]
            },

            (_, control) => self.unexpected(control.kind()),
        }
    }

    fn responder_step<E>(&mut self, control: ControlMessage, env: &E) -> Vec<HandshakeAction>
    where
        E: Environment<Instant = I>,
    {
        match (self.state, control) {
            (HandshakeState::AwaitingPeerToken, ControlMessage::Token(token)) => {
                if let Err(e) = self.verify_peer_token(&token, env) {
                    return self.fail(e);
                }

                let challenge = Challenge::generate(env);
                let hex = challenge.to_hex();
                self.challenge = Some(challenge);
                self.state = HandshakeState::AwaitingResponse;

                vec![HandshakeAction::Send(ControlMessage::Challenge(hex))]
            },

            (HandshakeState::AwaitingResponse, ControlMessage::Response(hex)) => {
                // Single use: the challenge leaves the state whatever the outcome.
                let Some(challenge) = self.challenge.take() else {
                    return self.unexpected("response");
                };

                if let Err(e) = auth::verify_response(&challenge, &hex, self.peer(), &self.key) {
                    return self.fail(e.into());
                }

                let token = auth::issue(self.local, &self.key, env.wall_clock_secs());
                self.state = HandshakeState::PeerTokenExchanged;

                vec![
                    HandshakeAction::Admit { peer: self.peer() },
                    HandshakeAction::Send(ControlMessage::Token(token.encode())),
                ]
            },

            (HandshakeState::PeerTokenExchanged, ControlMessage::Confirmed) => {
                self.state = HandshakeState::Confirmed;

                vec![HandshakeAction::Established { peer: self.peer() }]
            },

            (_, control) => self.unexpected(control.kind()),
        }
    }

    fn verify_peer_token<E>(&self, token: &str, env: &E) -> Result<(), HandshakeError>
    where
        E: Environment<Instant = I>,
    {
        let window = self.config.token_window_secs;
        auth::verify(token, self.peer(), &self.key, window, env.wall_clock_secs())?;
        Ok(())
    }

    fn unexpected(&mut self, kind: &'static str) -> Vec<HandshakeAction> {
        let error = HandshakeError::UnexpectedMessage { state: self.state, kind };
        self.fail(error)
    }

    /// Move to Rejected and tell the driver how to close.
    fn fail(&mut self, error: HandshakeError) -> Vec<HandshakeAction> {
        self.state = HandshakeState::Rejected;
        self.challenge = None;

        match self.role {
            HandshakeRole::Responder => vec![HandshakeAction::Reject(error)],
            HandshakeRole::Initiator => vec![HandshakeAction::Close(error)],
        }
    }
}
