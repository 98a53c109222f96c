use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::warn;
use zeroize::Zeroizing;

use super::messages::ClientMessage;
use super::messages::ServerMessage;
use crate::error::ExchangeError;
use crate::oprf;
use crate::oprf::BlindingState;
use crate::oprf::ExchangeRequest;
use crate::oprf::SharedSecret;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an exchange, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an exchange is. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingHandshakeAck,
    AwaitingBetaPoint,
    Completed,
    /// The server answered `invalid`, or with a point off the curve.
    Rejected,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Rejected | SessionPhase::Failed
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingHandshakeAck => "awaiting handshake ack",
            SessionPhase::AwaitingBetaPoint => "awaiting beta point",
            SessionPhase::Completed => "completed",
            SessionPhase::Rejected => "rejected",
            SessionPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What the driver should do after feeding a message to the session.
#[derive(Debug)]
pub enum SessionStep {
    Send(ClientMessage),
    Finished(SharedSecret),
}

/// Versions announced and expected during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersions {
    pub client: String,
    pub protocol: String,
}

/// One OPRF exchange, independent of any transport.
///
/// Owns everything the exchange needs, including the blinding state, so
/// that concurrent sessions share nothing. The blinding scalar is created
/// when the handshake is acknowledged and consumed by the server's answer;
/// it cannot outlive the session.
pub struct ExchangeSession {
    id: SessionId,
    phase: SessionPhase,
    versions: ProtocolVersions,
    request: ExchangeRequest,
    hmac_key: Zeroizing<String>,
    api_email: String,
    blinding: Option<BlindingState>,
}

impl fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl ExchangeSession {
    pub fn new(
        request: ExchangeRequest,
        hmac_key: &str,
        api_email: &str,
        versions: ProtocolVersions,
    ) -> Self {
        Self {
            id: SessionId::next(),
            phase: SessionPhase::Idle,
            versions,
            request,
            hmac_key: Zeroizing::new(hmac_key.to_owned()),
            api_email: api_email.to_owned(),
            blinding: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Opens the handshake.
    pub fn start(&mut self) -> Result<ClientMessage, ExchangeError> {
        if self.phase != SessionPhase::Idle {
            return Err(ExchangeError::invalid_input(format!(
                "session {} already started",
                self.id
            )));
        }

        self.phase = SessionPhase::AwaitingHandshakeAck;
        debug!(session = %self.id, "sending client hello");
        Ok(ClientMessage::Hello {
            client_version: self.versions.client.clone(),
        })
    }

    /// Advances the session with one inbound message.
    ///
    /// Any error leaves the session in a terminal phase.
    pub fn on_message(&mut self, raw: &str) -> Result<SessionStep, ExchangeError> {
        let phase = self.phase;
        let message = match raw.parse::<ServerMessage>() {
            Ok(message) => message,
            Err(e) => {
                warn!(session = %self.id, %phase, "unparsable server message: {e}");
                return Err(self.fail(ExchangeError::UnexpectedMessage { phase }));
            }
        };

        match (phase, message) {
            (SessionPhase::AwaitingHandshakeAck, ServerMessage::HandshakeAck { protocol_version })
                if protocol_version == self.versions.protocol =>
            {
                self.on_handshake_ack()
            }
            (SessionPhase::AwaitingBetaPoint, ServerMessage::BlindedResponse(beta)) => {
                let Some(blinding) = self.blinding.take() else {
                    return Err(self.fail(ExchangeError::UnexpectedMessage { phase }));
                };
                match oprf::complete_exchange(&beta, blinding, self.request.master()) {
                    Ok(secret) => {
                        self.phase = SessionPhase::Completed;
                        debug!(session = %self.id, "exchange completed");
                        Ok(SessionStep::Finished(secret))
                    }
                    Err(e) => Err(self.fail(e)),
                }
            }
            (SessionPhase::AwaitingBetaPoint, ServerMessage::Invalid) => {
                Err(self.fail(ExchangeError::InvalidCurvePoint))
            }
            (phase, message) => {
                warn!(session = %self.id, %phase, "out-of-order server message: {message:?}");
                Err(self.fail(ExchangeError::UnexpectedMessage { phase }))
            }
        }
    }

    /// Moves to the terminal phase matching `error` and drops the blinding
    /// state. Returns `error` for convenience.
    pub fn fail(&mut self, error: ExchangeError) -> ExchangeError {
        self.blinding = None;
        if !self.phase.is_terminal() {
            self.phase = match error {
                ExchangeError::InvalidCurvePoint => SessionPhase::Rejected,
                _ => SessionPhase::Failed,
            };
        }
        error
    }

    fn on_handshake_ack(&mut self) -> Result<SessionStep, ExchangeError> {
        let (request, blinding) = match oprf::begin_exchange(&self.request, &self.hmac_key) {
            Ok(blinded) => blinded,
            Err(e) => return Err(self.fail(e)),
        };

        self.blinding = Some(blinding);
        self.phase = SessionPhase::AwaitingBetaPoint;
        debug!(session = %self.id, "handshake acknowledged, sending blinded point");

        Ok(SessionStep::Send(ClientMessage::BlindedRequest {
            request,
            api_email: self.api_email.clone(),
        }))
    }
}
