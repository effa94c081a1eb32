//! Handshake control messages.
//!
//! Every control message travels as a single text frame. The grammar is
//! deliberately small:
//!
//! ```text
//! token     = hex(identity ":" timestamp) "|" hex(signature)
//! challenge = "CHALLENGE:" hex(32 random bytes)
//! response  = hex(signature)
//! rejected  = "AUTH_FAILED"
//! confirmed = "AUTH_OK"
//! heartbeat = "PING"
//! ```
//!
//! Parsing here is purely syntactic. Whether a token or response is genuine is
//! decided by the codecs in `skylink-core`, which fail closed on anything this
//! module lets through.

use crate::{
    Message,
    errors::{ProtocolError, Result},
};

/// Opaque marker sent before closing a failed handshake.
///
/// The same marker is used for every failure cause so that a peer cannot learn
/// which check rejected it.
pub const REJECTION_MARKER: &str = "AUTH_FAILED";

/// Marker the initiator sends after verifying the responder's token.
pub const CONFIRMATION_MARKER: &str = "AUTH_OK";

/// Keepalive an authenticated producer sends while it has no record to send.
pub const HEARTBEAT_MARKER: &str = "PING";

/// Literal prefix of a challenge message.
pub const CHALLENGE_PREFIX: &str = "CHALLENGE:";

/// Separator between the hex-encoded message and signature of a token.
const TOKEN_DELIMITER: char = '|';

/// A parsed handshake control message.
///
/// Values are kept in their wire encoding (hex strings). Decoding and
/// verification belong to the auth codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Full wire form of an identity token
    Token(String),
    /// Hex-encoded challenge bytes (prefix stripped)
    Challenge(String),
    /// Hex-encoded challenge response
    Response(String),
    /// Peer rejected the handshake
    Rejected,
    /// Peer confirmed our token
    Confirmed,
    /// Producer keepalive, only meaningful after the handshake
    Heartbeat,
}

impl ControlMessage {
    /// Classify a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedControl` if the text matches none of the
    ///   grammar rules above
    pub fn parse(text: &str) -> Result<Self> {
        if text == REJECTION_MARKER {
            return Ok(Self::Rejected);
        }
        if text == CONFIRMATION_MARKER {
            return Ok(Self::Confirmed);
        }
        if text == HEARTBEAT_MARKER {
            return Ok(Self::Heartbeat);
        }

        if let Some(challenge) = text.strip_prefix(CHALLENGE_PREFIX) {
            if !is_hex(challenge) {
                return Err(ProtocolError::MalformedControl("challenge is not hex"));
            }
            return Ok(Self::Challenge(challenge.to_string()));
        }

        if text.contains(TOKEN_DELIMITER) {
            return Ok(Self::Token(text.to_string()));
        }

        if is_hex(text) {
            return Ok(Self::Response(text.to_string()));
        }

        Err(ProtocolError::MalformedControl("unrecognized control message"))
    }

    /// Whether a text frame looks like an identity token.
    ///
    /// Used by the coordinator to tell a producer opening a handshake apart
    /// from a subscriber.
    pub fn is_token(text: &str) -> bool {
        matches!(Self::parse(text), Ok(Self::Token(_)))
    }

    /// Wire encoding.
    pub fn encode(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::Challenge(hex) => format!("{CHALLENGE_PREFIX}{hex}"),
            Self::Response(hex) => hex.clone(),
            Self::Rejected => REJECTION_MARKER.to_string(),
            Self::Confirmed => CONFIRMATION_MARKER.to_string(),
            Self::Heartbeat => HEARTBEAT_MARKER.to_string(),
        }
    }

    /// Short name for logs. Never includes key-derived material.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Challenge(_) => "challenge",
            Self::Response(_) => "response",
            Self::Rejected => "rejected",
            Self::Confirmed => "confirmed",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl From<ControlMessage> for Message {
    fn from(control: ControlMessage) -> Self {
        Message::Text(control.encode())
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_parse_to_markers() {
        assert_eq!(ControlMessage::parse("AUTH_FAILED").unwrap(), ControlMessage::Rejected);
        assert_eq!(ControlMessage::parse("AUTH_OK").unwrap(), ControlMessage::Confirmed);
        assert_eq!(ControlMessage::parse("PING").unwrap(), ControlMessage::Heartbeat);
    }

    #[test]
    fn challenge_prefix_is_stripped() {
        let parsed = ControlMessage::parse("CHALLENGE:00ff").unwrap();
        assert_eq!(parsed, ControlMessage::Challenge("00ff".to_string()));
        assert_eq!(parsed.encode(), "CHALLENGE:00ff");
    }

    #[test]
    fn challenge_with_bad_hex_is_malformed() {
        assert!(ControlMessage::parse("CHALLENGE:xyz").is_err());
        assert!(ControlMessage::parse("CHALLENGE:").is_err());
    }

    #[test]
    fn delimiter_marks_a_token() {
        assert!(ControlMessage::is_token("aa|bb"));
        // Syntactic only: garbage around the delimiter is rejected later.
        assert!(ControlMessage::is_token("not hex|at all"));
        assert!(!ControlMessage::is_token("abcdef"));
        assert!(!ControlMessage::is_token("subscribe"));
    }

    #[test]
    fn bare_hex_is_a_response() {
        assert_eq!(
            ControlMessage::parse("deadBEEF").unwrap(),
            ControlMessage::Response("deadBEEF".to_string())
        );
    }

    #[test]
    fn markers_are_not_valid_payloads() {
        assert!(!REJECTION_MARKER.contains(TOKEN_DELIMITER));
        assert!(!is_hex(REJECTION_MARKER));
        assert!(!is_hex(CONFIRMATION_MARKER));
        assert!(!is_hex(HEARTBEAT_MARKER));
        assert!(!HEARTBEAT_MARKER.contains(TOKEN_DELIMITER));
        assert!(!REJECTION_MARKER.starts_with(CHALLENGE_PREFIX));
    }

    #[test]
    fn empty_text_is_malformed() {
        assert!(matches!(ControlMessage::parse(""), Err(ProtocolError::MalformedControl(_))));
    }
}
