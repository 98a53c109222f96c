//! The textual messages exchanged with an OPRF server.
//!
//! ```text
//! C -> S  __client_<clientVersion>_connected__
//! S -> C  __protocol_<protocolVersion>_connected__
//! C -> S  <alphaX>,<alphaY>,<identityHash>,<apiEmail>
//! S -> C  <betaX>,<betaY>  |  invalid
//! ```

use std::fmt;
use std::str::FromStr;

use crate::oprf::BlindedRequest;
use crate::oprf::EncodedCoordinates;

const CLIENT_PREFIX: &str = "__client_";
const PROTOCOL_PREFIX: &str = "__protocol_";
const CONNECTED_SUFFIX: &str = "_connected__";
const INVALID: &str = "invalid";
const FIELD_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Hello {
        client_version: String,
    },
    BlindedRequest {
        request: BlindedRequest,
        api_email: String,
    },
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Hello { client_version } => {
                write!(f, "{CLIENT_PREFIX}{client_version}{CONNECTED_SUFFIX}")
            }
            ClientMessage::BlindedRequest { request, api_email } => write!(
                f,
                "{x},{y},{identity},{api_email}",
                x = request.alpha.x,
                y = request.alpha.y,
                identity = request.identity_hash,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    HandshakeAck { protocol_version: String },
    BlindedResponse(EncodedCoordinates),
    /// The server found the client's point invalid.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MessageParseError {
    #[error("empty message")]
    Empty,

    #[error("expected 2 comma-separated coordinates, got {0} fields")]
    FieldCount(usize),

    #[error("unrecognized message")]
    Unrecognized,
}

impl FromStr for ServerMessage {
    type Err = MessageParseError;

    /// Classifies a message by shape only. Coordinates are not decoded here;
    /// a malformed coordinate surfaces later as an invalid curve point.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MessageParseError::Empty);
        }
        if s == INVALID {
            return Ok(ServerMessage::Invalid);
        }
        if let Some(protocol_version) = s
            .strip_prefix(PROTOCOL_PREFIX)
            .and_then(|rest| rest.strip_suffix(CONNECTED_SUFFIX))
        {
            return Ok(ServerMessage::HandshakeAck {
                protocol_version: protocol_version.to_owned(),
            });
        }

        let fields: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        match fields.as_slice() {
            [x, y] => Ok(ServerMessage::BlindedResponse(EncodedCoordinates::new(
                *x, *y,
            ))),
            [_] => Err(MessageParseError::Unrecognized),
            _ => Err(MessageParseError::FieldCount(fields.len())),
        }
    }
}
