//! Fuzz target for the handshake state machine
//!
//! Feeds arbitrary frame sequences to both roles. The fuzzer never holds the
//! authentication key, so nothing it sends can be genuine.
//!
//! # Invariants
//!
//! - No input sequence establishes a session or gets a peer admitted
//! - Once terminal, the machine refuses further input
//! - NEVER panic on any frame sequence

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use skylink_core::{
    env::Environment,
    handshake::{Handshake, HandshakeAction, HandshakeConfig},
};
use skylink_crypto::AuthKey;
use skylink_proto::{CHALLENGE_PREFIX, Identity, Message};

#[derive(Clone)]
struct FuzzEnv {
    wall: u64,
}

impl Environment for FuzzEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}

#[derive(Debug, Arbitrary)]
enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Challenge(String),
}

impl Frame {
    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text),
            Self::Binary(bytes) => Message::Binary(Bytes::from(bytes)),
            Self::Challenge(hex) => Message::Text(format!("{CHALLENGE_PREFIX}{hex}")),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    responder: bool,
    wall: u64,
    frames: Vec<Frame>,
}

fuzz_target!(|input: Input| {
    let Ok(key) = AuthKey::from_bytes(b"fuzz-handshake-authentication-key") else { return };
    let env = FuzzEnv { wall: input.wall };
    let config = HandshakeConfig::default();

    let mut hs = if input.responder {
        Handshake::responder(Identity::Coordinator, key, config, env.now())
    } else {
        Handshake::initiator(Identity::Producer, key, config, env.now())
    };
    if hs.start(env.wall).is_err() {
        return;
    }

    for frame in input.frames {
        let was_terminal = hs.state().is_terminal();
        match hs.handle_message(&frame.into_message(), &env) {
            Ok(actions) => {
                assert!(!was_terminal);
                for action in actions {
                    assert!(!matches!(
                        action,
                        HandshakeAction::Established { .. } | HandshakeAction::Admit { .. }
                    ));
                }
            },
            Err(_) => {},
        }
        assert!(!hs.is_established());
    }
});
