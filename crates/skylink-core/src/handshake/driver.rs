//! Async driver for the handshake state machine.

use skylink_proto::{Identity, Message, REJECTION_MARKER};
use tracing::debug;

use super::{Handshake, HandshakeAction};
use crate::{env::Environment, error::HandshakeError, transport::Connection};

/// Run `handshake` to completion over `connection`, admitting any verified
/// peer.
///
/// `first` is a message the caller already read from the connection (the
/// coordinator reads one to classify the peer). Every receive is bounded by
/// the handshake's remaining time.
///
/// # Errors
///
/// - Whatever error made the machine reject or close
/// - `HandshakeError::Timeout` if the deadline passes
/// - `HandshakeError::TransportClosed` if the connection ends first
pub async fn drive<E: Environment>(
    handshake: &mut Handshake<E::Instant>,
    connection: &mut Connection,
    env: &E,
    first: Option<Message>,
) -> Result<Identity, HandshakeError> {
    drive_with(handshake, connection, env, first, |_| true).await
}

/// Like [`drive`], but asks `admit` before the responder reveals its token.
///
/// `admit` runs once, right after the peer's challenge response verified.
/// Returning `false` sends the rejection marker and fails the attempt with
/// `HandshakeError::NotAdmitted`, so a refused peer never reaches the
/// confirmed state.
///
/// # Errors
///
/// Same as [`drive`], plus `HandshakeError::NotAdmitted`.
pub async fn drive_with<E, F>(
    handshake: &mut Handshake<E::Instant>,
    connection: &mut Connection,
    env: &E,
    first: Option<Message>,
    mut admit: F,
) -> Result<Identity, HandshakeError>
where
    E: Environment,
    F: FnMut(Identity) -> bool,
{
    let actions = handshake.start(env.wall_clock_secs())?;
    if let Some(peer) = execute(handshake, actions, connection, &mut admit).await? {
        return Ok(peer);
    }

    let mut pending = first;

    loop {
        let message = match pending.take() {
            Some(message) => message,
            None => {
                let remaining = handshake.time_remaining(env.now());

                tokio::select! {
                    received = connection.recv() => match received {
                        Some(message) => message,
                        None => {
                            let actions = handshake.abort(HandshakeError::TransportClosed);
                            execute(handshake, actions, connection, &mut admit).await?;
                            return Err(HandshakeError::TransportClosed);
                        },
                    },
                    () = env.sleep(remaining) => {
                        let actions = handshake.tick(env.now());
                        execute(handshake, actions, connection, &mut admit).await?;
                        // The deadline can only be missed by a hair here, still a timeout.
                        return Err(HandshakeError::Timeout { elapsed: remaining });
                    },
                }
            },
        };

        debug!(state = ?handshake.state(), len = message.len(), "handshake message");

        let actions = handshake.handle_message(&message, env)?;
        if let Some(peer) = execute(handshake, actions, connection, &mut admit).await? {
            return Ok(peer);
        }
    }
}

/// Send the opaque rejection marker.
///
/// Best effort: the peer may already be gone, and a failed send changes
/// nothing about the rejection.
pub async fn send_rejection(connection: &Connection) {
    let marker = Message::Text(REJECTION_MARKER.to_string());
    if let Err(e) = connection.send(marker).await {
        debug!(error = %e, "rejection marker not delivered");
    }
}

/// Execute actions in order. `Some(peer)` once established.
async fn execute<I, F>(
    handshake: &mut Handshake<I>,
    actions: Vec<HandshakeAction>,
    connection: &Connection,
    admit: &mut F,
) -> Result<Option<Identity>, HandshakeError>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = std::time::Duration>,
    F: FnMut(Identity) -> bool,
{
    for action in actions {
        match action {
            HandshakeAction::Send(control) => {
                connection.send(control.into()).await?;
            },
            HandshakeAction::Admit { peer } => {
                if !admit(peer) {
                    handshake.abort(HandshakeError::NotAdmitted);
                    send_rejection(connection).await;
                    return Err(HandshakeError::NotAdmitted);
                }
            },
            HandshakeAction::Reject(error) => {
                send_rejection(connection).await;
                return Err(error);
            },
            HandshakeAction::Close(error) => return Err(error),
            HandshakeAction::Established { peer } => return Ok(Some(peer)),
        }
    }
    Ok(None)
}
