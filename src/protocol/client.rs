use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;
use zeroize::Zeroizing;

use super::channel::LineChannel;
use super::channel::TextChannel;
use super::messages::ClientMessage;
use super::session::ExchangeSession;
use super::session::ProtocolVersions;
use super::session::SessionStep;
use crate::config_models::exchange_params::ExchangeParams;
use crate::error::ExchangeError;
use crate::oprf::ExchangeRequest;
use crate::oprf::SharedSecret;
use crate::prng;
use crate::prng::PasswordRng;

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub client_version: String,
    pub protocol_version: String,

    /// Longest wait for any single server message.
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_version: crate::CLIENT_VERSION.to_owned(),
            protocol_version: crate::PROTOCOL_VERSION.to_owned(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Runs OPRF exchanges over caller-supplied channels.
///
/// Sessions started through the same client run one at a time. Whatever the
/// outcome, the channel is closed before a call returns.
#[derive(Debug, Default)]
pub struct OprfClient {
    config: ClientConfig,
    turn: Mutex<()>,
}

impl OprfClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            turn: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs one exchange and returns the shared secret.
    pub async fn run_exchange<C>(
        &self,
        channel: &mut C,
        request: ExchangeRequest,
        hmac_key: &str,
        api_email: &str,
        cancel: &CancellationToken,
    ) -> Result<SharedSecret, ExchangeError>
    where
        C: TextChannel + ?Sized,
    {
        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("cancelled while waiting for an earlier session");
                if let Err(e) = channel.close().await {
                    debug!("error while closing channel: {e}");
                }
                return Err(ExchangeError::Cancelled);
            }
            turn = self.turn.lock() => turn,
        };

        let versions = ProtocolVersions {
            client: self.config.client_version.clone(),
            protocol: self.config.protocol_version.clone(),
        };
        let mut session = ExchangeSession::new(request, hmac_key, api_email, versions);
        let span = info_span!("oprf_session", id = %session.id());

        async {
            let outcome = self.drive(channel, &mut session, cancel).await;

            if let Err(e) = channel.close().await {
                debug!("error while closing channel: {e}");
            }

            match &outcome {
                Ok(_) => info!("exchange completed"),
                Err(e) => warn!(phase = %session.phase(), "exchange ended: {e}"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Runs one exchange and maps the shared secret onto the configured
    /// alphabet.
    ///
    /// The alphabet and length are checked before anything is sent.
    pub async fn derive_password<C>(
        &self,
        channel: &mut C,
        request: ExchangeRequest,
        params: &ExchangeParams,
        cancel: &CancellationToken,
    ) -> Result<Zeroizing<String>, ExchangeError>
    where
        C: TextChannel + ?Sized,
    {
        if let Err(e) = prng::validate_policy(&params.alphabet, params.password_length) {
            if let Err(close_error) = channel.close().await {
                debug!("error while closing channel: {close_error}");
            }
            return Err(e.into());
        }

        let secret = self
            .run_exchange(
                channel,
                request,
                &params.hmac_key,
                &params.api_email,
                cancel,
            )
            .await?;

        let mut rng = PasswordRng::seed(secret.expose());
        let password = prng::derive_password(&mut rng, &params.alphabet, params.password_length)?;
        Ok(Zeroizing::new(password))
    }

    /// Connects to the server named in `params` and derives a password.
    pub async fn derive_password_over_tcp(
        &self,
        request: ExchangeRequest,
        params: &ExchangeParams,
        connect_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Zeroizing<String>, ExchangeError> {
        prng::validate_policy(&params.alphabet, params.password_length)?;

        let mut channel = tokio::select! {
            _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            connected = LineChannel::connect(&params.server_host, params.server_port, connect_timeout) => connected?,
        };

        self.derive_password(&mut channel, request, params, cancel)
            .await
    }

    async fn drive<C>(
        &self,
        channel: &mut C,
        session: &mut ExchangeSession,
        cancel: &CancellationToken,
    ) -> Result<SharedSecret, ExchangeError>
    where
        C: TextChannel + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(session.fail(ExchangeError::Cancelled));
        }

        let hello = session.start()?;
        self.send(channel, session, hello, cancel).await?;

        loop {
            let raw = self.next_message(channel, session, cancel).await?;
            match session.on_message(&raw)? {
                SessionStep::Send(message) => self.send(channel, session, message, cancel).await?,
                SessionStep::Finished(secret) => return Ok(secret),
            }
        }
    }

    async fn send<C>(
        &self,
        channel: &mut C,
        session: &mut ExchangeSession,
        message: ClientMessage,
        cancel: &CancellationToken,
    ) -> Result<(), ExchangeError>
    where
        C: TextChannel + ?Sized,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(session.fail(ExchangeError::Cancelled)),
            sent = channel.send(message.to_string()) => sent.map_err(|e| session.fail(e)),
        }
    }

    /// Waits for the next server message, bounded by the response timeout.
    async fn next_message<C>(
        &self,
        channel: &mut C,
        session: &mut ExchangeSession,
        cancel: &CancellationToken,
    ) -> Result<String, ExchangeError>
    where
        C: TextChannel + ?Sized,
    {
        let phase = session.phase();
        let waited = self.config.response_timeout;

        tokio::select! {
            _ = cancel.cancelled() => Err(session.fail(ExchangeError::Cancelled)),
            received = tokio::time::timeout(waited, channel.recv()) => match received {
                Err(_) => Err(session.fail(ExchangeError::Timeout { phase, waited })),
                Ok(Err(e)) => Err(session.fail(e)),
                Ok(Ok(None)) => Err(session.fail(ExchangeError::ChannelClosed { phase })),
                Ok(Ok(Some(raw))) => Ok(raw),
            },
        }
    }
}
