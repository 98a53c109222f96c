use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use oopass::oprf;
use oopass::oprf::EncodedCoordinates;
use oopass::oprf::OprfKey;
use oopass::protocol::LineChannel;
use oopass::protocol::TextChannel;
use oopass::ExchangeError;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Evaluates every well-formed request.
    Honest,

    /// Answers every blinded point with `invalid`.
    RejectAll,

    /// Reads the hello and then says nothing until the client hangs up.
    SilentAfterHello,

    /// Acknowledges the handshake, reads the blinded point, then says
    /// nothing until the client hangs up.
    SilentAfterAck,

    /// Evaluates, then corrupts the y coordinate of the answer.
    MangledBeta,
}

/// An OPRF server on a loopback port, serving each connection in its own
/// task until dropped.
pub struct FakeOprfServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    hangups: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeOprfServer {
    pub async fn start(key: OprfKey, mode: ServerMode) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let key = Arc::new(key);
        let requests = Arc::new(Mutex::new(vec![]));
        let hangups = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let requests = requests.clone();
            let hangups = hangups.clone();
            async move {
                while let Ok((stream, peer)) = listener.accept().await {
                    debug!("fake server accepted {peer}");
                    let key = key.clone();
                    let requests = requests.clone();
                    let hangups = hangups.clone();
                    tokio::spawn(async move {
                        let channel = LineChannel::new(stream);
                        match serve(channel, &key, mode, &requests).await {
                            Ok(Served::ClientHungUp) => {
                                hangups.fetch_add(1, Ordering::SeqCst);
                            }
                            Ok(Served::Answered) => {}
                            Err(e) => debug!("fake server connection ended: {e}"),
                        }
                    });
                }
            }
        });

        Ok(Self {
            addr,
            requests,
            hangups,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every blinded request received so far, as sent on the wire.
    pub fn blinded_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections the client closed while the server was still waiting.
    pub fn client_hangups(&self) -> usize {
        self.hangups.load(Ordering::SeqCst)
    }
}

impl Drop for FakeOprfServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Served {
    Answered,
    ClientHungUp,
}

async fn serve(
    mut channel: LineChannel<TcpStream>,
    key: &OprfKey,
    mode: ServerMode,
    requests: &Mutex<Vec<String>>,
) -> Result<Served, ExchangeError> {
    let Some(hello) = channel.recv().await? else {
        return Ok(Served::ClientHungUp);
    };
    if !hello.starts_with("__client_") {
        channel.send("invalid".to_owned()).await?;
        channel.close().await?;
        return Ok(Served::Answered);
    }

    if mode == ServerMode::SilentAfterHello {
        return wait_for_hang_up(&mut channel).await;
    }

    channel
        .send(format!("__protocol_{}_connected__", oopass::PROTOCOL_VERSION))
        .await?;

    let Some(request) = channel.recv().await? else {
        return Ok(Served::ClientHungUp);
    };
    requests.lock().unwrap().push(request.clone());

    if mode == ServerMode::SilentAfterAck {
        return wait_for_hang_up(&mut channel).await;
    }

    let fields: Vec<&str> = request.split(',').collect();
    let reply = match (mode, fields.as_slice()) {
        (ServerMode::RejectAll, _) => "invalid".to_owned(),
        (_, [x, y, _identity, _email]) => {
            match oprf::evaluate(&EncodedCoordinates::new(*x, *y), key) {
                Ok(beta) if mode == ServerMode::MangledBeta => format!("{},1", beta.x),
                Ok(beta) => format!("{},{}", beta.x, beta.y),
                Err(_) => "invalid".to_owned(),
            }
        }
        _ => "invalid".to_owned(),
    };

    channel.send(reply).await?;
    channel.close().await?;
    Ok(Served::Answered)
}

async fn wait_for_hang_up(channel: &mut LineChannel<TcpStream>) -> Result<Served, ExchangeError> {
    while channel.recv().await?.is_some() {}
    Ok(Served::ClientHungUp)
}
