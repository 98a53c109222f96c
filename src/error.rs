//! provides the error type for password-derivation exchanges.

use std::time::Duration;

use crate::prng::GeneratorError;
use crate::protocol::session::SessionPhase;

/// enumerates everything that can end an exchange.
///
/// Every variant is terminal for the session that produced it. A blinding
/// scalar is never reused, so retrying always means starting a new session.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// missing or malformed settings or request fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// the server answered with a point that is not on the curve, or
    /// rejected ours with `invalid`. Deliberately carries no detail.
    #[error("invalid curve point")]
    InvalidCurvePoint,

    #[error("unexpected message from server while {phase}")]
    UnexpectedMessage { phase: SessionPhase },

    #[error("timed out after {waited:?} while {phase}")]
    Timeout {
        phase: SessionPhase,
        waited: Duration,
    },

    #[error("server closed the channel while {phase}")]
    ChannelClosed { phase: SessionPhase },

    #[error("exchange cancelled")]
    Cancelled,

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("settings store error: {0}")]
    Settings(String),

    #[error("cryptographic operation failed")]
    Crypto,
}

impl ExchangeError {
    /// Whether the user may reasonably try again with a fresh session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ChannelClosed { .. } | Self::Transport(_)
        )
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
