//! Peer roles.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Role a peer claims during the handshake.
///
/// The set is closed: a string that does not name one of these variants is
/// rejected at parse time, so an attacker cannot smuggle an arbitrary role
/// name through a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Telemetry source (initiator)
    Producer,
    /// Relay that fans records out to subscribers (responder)
    Coordinator,
}

impl Identity {
    /// Canonical wire name. This is also the byte string fed into MACs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Coordinator => "coordinator",
        }
    }

    /// The role on the other end of a handshake.
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Producer => Self::Coordinator,
            Self::Coordinator => Self::Producer,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producer" => Ok(Self::Producer),
            "coordinator" => Ok(Self::Coordinator),
            other => Err(ProtocolError::UnknownIdentity(other.to_string())),
        }
    }
}
