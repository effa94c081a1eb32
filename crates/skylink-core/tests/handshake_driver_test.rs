//! Handshake driver tests over in-memory connections.

use std::time::Duration;

use skylink_core::{
    AuthError, HandshakeError, SystemEnv, auth,
    env::Environment,
    handshake::{self, Handshake, HandshakeAction, HandshakeConfig, HandshakeState},
    transport::Connection,
};
use skylink_crypto::AuthKey;
use skylink_proto::{CONFIRMATION_MARKER, Identity, Message, REJECTION_MARKER};

fn key() -> AuthKey {
    AuthKey::from_bytes(b"driver test authentication key!").unwrap()
}

fn other_key() -> AuthKey {
    AuthKey::from_bytes(b"unrelated key of decent length!!").unwrap()
}

async fn run_pair(
    producer_key: AuthKey,
    coordinator_key: AuthKey,
) -> (Result<Identity, HandshakeError>, Result<Identity, HandshakeError>) {
    let env = SystemEnv::new();
    let (mut producer_conn, mut coordinator_conn) = Connection::pair(8);

    let producer_env = env.clone();
    let producer = tokio::spawn(async move {
        let mut hs = Handshake::initiator(
            Identity::Producer,
            producer_key,
            HandshakeConfig::default(),
            producer_env.now(),
        );
        handshake::drive(&mut hs, &mut producer_conn, &producer_env, None).await
    });

    let mut hs = Handshake::responder(
        Identity::Coordinator,
        coordinator_key,
        HandshakeConfig::default(),
        env.now(),
    );
    let coordinator = handshake::drive(&mut hs, &mut coordinator_conn, &env, None).await;

    (producer.await.unwrap(), coordinator)
}

#[tokio::test]
async fn matching_keys_authenticate_both_sides() {
    let (producer, coordinator) = run_pair(key(), key()).await;

    assert_eq!(producer, Ok(Identity::Coordinator));
    assert_eq!(coordinator, Ok(Identity::Producer));
}

#[tokio::test]
async fn mismatched_keys_fail_both_sides() {
    let (producer, coordinator) = run_pair(other_key(), key()).await;

    assert_eq!(coordinator, Err(HandshakeError::Auth(AuthError::SignatureMismatch)));
    assert_eq!(producer, Err(HandshakeError::Rejected));
}

#[tokio::test]
async fn responder_sends_opaque_marker_on_failure() {
    let env = SystemEnv::new();
    let (mut peer, mut coordinator_conn) = Connection::pair(8);

    let forged = auth::issue(Identity::Producer, &other_key(), env.wall_clock_secs()).encode();
    let mut hs = Handshake::responder(
        Identity::Coordinator,
        key(),
        HandshakeConfig::default(),
        env.now(),
    );

    let result =
        handshake::drive(&mut hs, &mut coordinator_conn, &env, Some(Message::Text(forged))).await;

    assert_eq!(result, Err(HandshakeError::Auth(AuthError::SignatureMismatch)));
    assert_eq!(peer.recv().await, Some(Message::Text(REJECTION_MARKER.to_string())));
    drop(coordinator_conn);
    assert_eq!(peer.recv().await, None);
}

#[tokio::test]
async fn silent_peer_times_out() {
    let env = SystemEnv::new();
    let (_peer, mut coordinator_conn) = Connection::pair(8);
    let config =
        HandshakeConfig { timeout: Duration::from_millis(50), ..HandshakeConfig::default() };
    let mut hs = Handshake::responder(Identity::Coordinator, key(), config, env.now());

    let result = handshake::drive(&mut hs, &mut coordinator_conn, &env, None).await;

    assert!(matches!(result, Err(HandshakeError::Timeout { .. })), "got {result:?}");
}

#[tokio::test]
async fn peer_disconnect_is_transport_closed() {
    let env = SystemEnv::new();
    let (peer, mut producer_conn) = Connection::pair(8);
    let mut hs =
        Handshake::initiator(Identity::Producer, key(), HandshakeConfig::default(), env.now());

    let driver = tokio::spawn(async move {
        handshake::drive(&mut hs, &mut producer_conn, &env, None).await
    });
    drop(peer);

    assert_eq!(driver.await.unwrap(), Err(HandshakeError::TransportClosed));
}

#[tokio::test]
async fn confirmation_marker_is_last_handshake_message() {
    let env = SystemEnv::new();
    let (mut producer_conn, mut coordinator_conn) = Connection::pair(8);

    let producer_env = env.clone();
    let producer = tokio::spawn(async move {
        let mut hs = Handshake::initiator(
            Identity::Producer,
            key(),
            HandshakeConfig::default(),
            producer_env.now(),
        );
        let peer = handshake::drive(&mut hs, &mut producer_conn, &producer_env, None).await;
        (peer, producer_conn)
    });

    // Play the coordinator by hand to observe the wire.
    let token = coordinator_conn.recv().await.unwrap();
    let mut hs = Handshake::responder(
        Identity::Coordinator,
        key(),
        HandshakeConfig::default(),
        env.now(),
    );
    hs.start(env.wall_clock_secs()).unwrap();
    for action in hs.handle_message(&token, &env).unwrap() {
        if let HandshakeAction::Send(control) = action {
            coordinator_conn.send(control.into()).await.unwrap();
        }
    }
    let response = coordinator_conn.recv().await.unwrap();
    for action in hs.handle_message(&response, &env).unwrap() {
        if let HandshakeAction::Send(control) = action {
            coordinator_conn.send(control.into()).await.unwrap();
        }
    }

    let confirmation = coordinator_conn.recv().await.unwrap();
    assert_eq!(confirmation, Message::Text(CONFIRMATION_MARKER.to_string()));

    let (peer, _conn) = producer.await.unwrap();
    assert_eq!(peer, Ok(Identity::Coordinator));
}

#[tokio::test]
async fn refused_admission_rejects_before_responder_token() {
    let env = SystemEnv::new();
    let (mut producer_conn, mut coordinator_conn) = Connection::pair(8);

    let producer_env = env.clone();
    let producer = tokio::spawn(async move {
        let mut hs = Handshake::initiator(
            Identity::Producer,
            key(),
            HandshakeConfig::default(),
            producer_env.now(),
        );
        let result = handshake::drive(&mut hs, &mut producer_conn, &producer_env, None).await;
        (result, hs.state())
    });

    let mut asked = Vec::new();
    let mut hs =
        Handshake::responder(Identity::Coordinator, key(), HandshakeConfig::default(), env.now());
    let coordinator = handshake::drive_with(&mut hs, &mut coordinator_conn, &env, None, |peer| {
        asked.push(peer);
        false
    })
    .await;

    assert_eq!(coordinator, Err(HandshakeError::NotAdmitted));
    assert_eq!(asked, vec![Identity::Producer]);
    assert!(hs.state().is_terminal());

    let (producer, producer_state) = producer.await.unwrap();
    assert_eq!(producer, Err(HandshakeError::Rejected));
    assert_ne!(producer_state, HandshakeState::Confirmed);
}

#[tokio::test]
async fn admission_is_not_consulted_for_unverified_peers() {
    let env = SystemEnv::new();
    let (mut producer_conn, mut coordinator_conn) = Connection::pair(8);

    let producer_env = env.clone();
    tokio::spawn(async move {
        let mut hs = Handshake::initiator(
            Identity::Producer,
            other_key(),
            HandshakeConfig::default(),
            producer_env.now(),
        );
        handshake::drive(&mut hs, &mut producer_conn, &producer_env, None).await
    });

    let mut consulted = false;
    let mut hs =
        Handshake::responder(Identity::Coordinator, key(), HandshakeConfig::default(), env.now());
    let result = handshake::drive_with(&mut hs, &mut coordinator_conn, &env, None, |_| {
        consulted = true;
        true
    })
    .await;

    assert_eq!(result, Err(HandshakeError::Auth(AuthError::SignatureMismatch)));
    assert!(!consulted);
}
