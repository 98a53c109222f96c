use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tokio_util::codec::LinesCodecError;
use tracing::debug;

use super::session::SessionPhase;
use crate::error::ExchangeError;

/// Longest line accepted from a server. The largest legitimate message is
/// two 64-digit coordinates and a comma.
pub const MAX_LINE_LENGTH: usize = 4 * 1024;

/// A bidirectional channel of text messages.
///
/// `recv` yields `None` once the peer has closed the channel. `close` must be
/// safe to call more than once.
#[async_trait]
pub trait TextChannel: Send {
    async fn send(&mut self, message: String) -> Result<(), ExchangeError>;

    async fn recv(&mut self) -> Result<Option<String>, ExchangeError>;

    async fn close(&mut self) -> Result<(), ExchangeError>;
}

/// Newline-delimited messages over a byte stream.
#[derive(Debug)]
pub struct LineChannel<S> {
    framed: Framed<S, LinesCodec>,
}

impl<S> LineChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
        }
    }
}

impl LineChannel<TcpStream> {
    /// Opens a TCP connection, giving up after `connect_timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        debug!("connecting to {host}:{port}");
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ExchangeError::Timeout {
                phase: SessionPhase::Idle,
                waited: connect_timeout,
            })??;
        stream.set_nodelay(true)?;
        debug!("connected to {host}:{port}");
        Ok(Self::new(stream))
    }
}

fn transport_error(e: LinesCodecError) -> ExchangeError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => ExchangeError::Transport(format!(
            "server sent a line longer than {MAX_LINE_LENGTH} bytes"
        )),
        LinesCodecError::Io(e) => e.into(),
    }
}

#[async_trait]
impl<S> TextChannel for LineChannel<S>
where
    S: AsyncRead + AsyncWrite + Debug + Unpin + Send,
{
    async fn send(&mut self, message: String) -> Result<(), ExchangeError> {
        self.framed.send(message).await.map_err(transport_error)
    }

    async fn recv(&mut self) -> Result<Option<String>, ExchangeError> {
        self.framed.try_next().await.map_err(transport_error)
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        SinkExt::<String>::close(&mut self.framed)
            .await
            .map_err(transport_error)
    }
}
