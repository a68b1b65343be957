//! Task-per-session relay server on tokio.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cebridge_frame::{EnvelopeCodec, FrameError};
use cebridge_transport::async_io::{bind_tcp, AsyncChannelStream};
use cebridge_transport::LocalChannel;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::session::{SessionEnd, SessionSummary};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Async counterpart of [`crate::InstrumentConnector`].
pub trait AsyncInstrumentConnector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn open(&self) -> impl Future<Output = cebridge_transport::Result<Self::Stream>> + Send;

    fn describe(&self) -> String;
}

impl AsyncInstrumentConnector for LocalChannel {
    type Stream = AsyncChannelStream;

    fn open(&self) -> impl Future<Output = cebridge_transport::Result<AsyncChannelStream>> + Send {
        self.open_async()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Relay server that runs each session as a tokio task.
pub struct AsyncRelayServer<K = LocalChannel> {
    listener: TcpListener,
    local_addr: SocketAddr,
    connector: Arc<K>,
    max_payload_size: usize,
    next_session: AtomicU64,
}

impl AsyncRelayServer<LocalChannel> {
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_with_connector(config, LocalChannel::new(config.channel.as_str())).await
    }
}

impl<K: AsyncInstrumentConnector> AsyncRelayServer<K> {
    pub async fn bind_with_connector(config: &ServerConfig, connector: K) -> Result<Self> {
        let listener = bind_tcp(&config.bind_host, config.bind_port).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::Transport(e.into()))?;
        info!(
            addr = %local_addr,
            instrument = %connector.describe(),
            "async relay server ready"
        );
        Ok(Self {
            listener,
            local_addr,
            connector: Arc::new(connector),
            max_payload_size: config.max_payload_size,
            next_session: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
        info!(addr = %self.local_addr, "async relay server stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let _ = stream.set_nodelay(true);
        let id = format!(
            "session-{}",
            self.next_session.fetch_add(1, Ordering::Relaxed)
        );
        debug!(session = %id, %peer, "accepted relay connection");
        tokio::spawn(run_session(
            Arc::clone(&self.connector),
            id,
            stream,
            peer,
            self.max_payload_size,
        ));
    }
}

/// Bind with the default channel and serve until `shutdown` resolves.
pub async fn serve_async(
    bind_host: &str,
    bind_port: u16,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    AsyncRelayServer::bind(&ServerConfig::new(bind_host, bind_port))
        .await?
        .serve(shutdown)
        .await
}

async fn run_session<K: AsyncInstrumentConnector>(
    connector: Arc<K>,
    id: String,
    stream: TcpStream,
    peer: SocketAddr,
    max_payload_size: usize,
) -> Option<SessionSummary> {
    let channel = match connector.open().await {
        Ok(channel) => channel,
        Err(e) => {
            warn!(
                session = %id,
                %peer,
                instrument = %connector.describe(),
                error = %e,
                "instrument channel unavailable, dropping connection"
            );
            return None;
        }
    };

    let mut network = Framed::new(stream, EnvelopeCodec::with_max_payload(max_payload_size));
    let mut channel = Framed::new(channel, EnvelopeCodec::with_max_payload(max_payload_size));
    let mut exchanges = 0u64;

    let end = loop {
        let request = match network.next().await {
            None => break SessionEnd::ClientClosed,
            Some(Err(e)) if e.is_peer_closed() => break SessionEnd::ClientClosed,
            Some(Err(e)) => break SessionEnd::ClientError(e),
            Some(Ok(request)) => request,
        };
        if let Err(e) = channel.send(request).await {
            break SessionEnd::ChannelError(e);
        }
        let response = match channel.next().await {
            None => break SessionEnd::ChannelError(FrameError::PeerClosed),
            Some(Err(e)) => break SessionEnd::ChannelError(e),
            Some(Ok(response)) => response,
        };
        if let Err(e) = network.send(response).await {
            break SessionEnd::ClientError(e);
        }
        exchanges += 1;
    };

    match &end {
        SessionEnd::ClientClosed => debug!(session = %id, exchanges, "session closed by client"),
        other => warn!(session = %id, exchanges, reason = %other, "session torn down"),
    }
    Some(SessionSummary { exchanges, end })
}

#[cfg(test)]
mod tests {
    use cebridge_frame::Envelope;
    use cebridge_transport::TransportError;
    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    use super::*;

    /// Connects each session to a tokio TCP mock instrument.
    struct TcpInstrument(SocketAddr);

    impl AsyncInstrumentConnector for TcpInstrument {
        type Stream = TcpStream;

        fn open(&self) -> impl Future<Output = cebridge_transport::Result<TcpStream>> + Send {
            let addr = self.0;
            async move { TcpStream::connect(addr).await.map_err(TransportError::from) }
        }

        fn describe(&self) -> String {
            format!("tcp://{}", self.0)
        }
    }

    struct Unavailable;

    impl AsyncInstrumentConnector for Unavailable {
        type Stream = TcpStream;

        async fn open(&self) -> cebridge_transport::Result<TcpStream> {
            Err(std::io::Error::from(std::io::ErrorKind::NotFound).into())
        }

        fn describe(&self) -> String {
            "unavailable".to_string()
        }
    }

    /// Tags every response with the instrument handle it came from.
    async fn spawn_instrument() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut handle_no = 0u32;
            while let Ok((stream, _)) = listener.accept().await {
                handle_no += 1;
                let tag = handle_no;
                tokio::spawn(async move {
                    let mut framed = Framed::new(stream, EnvelopeCodec::new());
                    while let Some(Ok(request)) = framed.next().await {
                        let request: Value = serde_json::from_slice(request.body()).unwrap();
                        let body = json!({"result": {"method": request["method"], "handle": tag}});
                        let body = Envelope::new(serde_json::to_vec(&body).unwrap());
                        if framed.send(body).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    async fn start<K: AsyncInstrumentConnector>(
        connector: K,
    ) -> (SocketAddr, oneshot::Sender<()>) {
        let server =
            AsyncRelayServer::bind_with_connector(&ServerConfig::new("127.0.0.1", 0), connector)
                .await
                .unwrap();
        let addr = server.local_addr();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));
        (addr, tx)
    }

    async fn call(framed: &mut Framed<TcpStream, EnvelopeCodec>, method: &str) -> Value {
        let request = json!({"jsonrpc": "2.0", "method": method, "params": {}, "id": 1});
        framed
            .send(Envelope::new(serde_json::to_vec(&request).unwrap()))
            .await
            .unwrap();
        let response = framed.next().await.unwrap().unwrap();
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn relays_each_connection_to_its_own_handle() {
        let (addr, stop) = start(TcpInstrument(spawn_instrument().await)).await;

        let mut first = Framed::new(TcpStream::connect(addr).await.unwrap(), EnvelopeCodec::new());
        let first_reply = call(&mut first, "ping").await;
        let handle = first_reply["result"]["handle"].clone();

        let mut second = Framed::new(TcpStream::connect(addr).await.unwrap(), EnvelopeCodec::new());
        let second_reply = call(&mut second, "get_version").await;
        assert_ne!(second_reply["result"]["handle"], handle);

        for _ in 0..3 {
            let reply = call(&mut first, "ping").await;
            assert_eq!(reply["result"]["handle"], handle);
            assert_eq!(reply["result"]["method"], "ping");
        }

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn unavailable_channel_closes_connection() {
        let (addr, stop) = start(Unavailable).await;

        let mut framed = Framed::new(TcpStream::connect(addr).await.unwrap(), EnvelopeCodec::new());
        let _ = framed.send(Envelope::new(&b"{}"[..])).await;
        assert!(matches!(framed.next().await, None | Some(Err(_))));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn oversized_request_tears_down_session() {
        let server = AsyncRelayServer::bind_with_connector(
            &ServerConfig::new("127.0.0.1", 0).with_max_payload_size(8),
            TcpInstrument(spawn_instrument().await),
        )
        .await
        .unwrap();
        let addr = server.local_addr();
        let (stop, rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        let mut framed = Framed::new(
            TcpStream::connect(addr).await.unwrap(),
            EnvelopeCodec::new(),
        );
        framed
            .send(Envelope::new(&b"0123456789"[..]))
            .await
            .unwrap();
        assert!(matches!(framed.next().await, None | Some(Err(_))));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn oversized_response_never_reaches_client() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let instrument = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let instrument_addr = instrument.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = instrument.accept().await.unwrap();
            let mut request = [0u8; 6];
            stream.read_exact(&mut request).await.unwrap();
            stream.write_all(&65u32.to_le_bytes()).await.unwrap();
            // Stay open until the session drops its handle.
            let _ = stream.read(&mut [0u8; 1]).await;
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (network, peer) = listener.accept().await.unwrap();
        let session = tokio::spawn(run_session(
            Arc::new(TcpInstrument(instrument_addr)),
            "session-t".to_string(),
            network,
            peer,
            64,
        ));

        client.write_all(b"\x02\x00\x00\x00{}").await.unwrap();
        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.exchanges, 0);
        assert!(matches!(
            summary.end,
            SessionEnd::ChannelError(FrameError::MessageTooLarge { size: 65, max: 64 })
        ));
        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn serve_returns_on_shutdown() {
        let server = AsyncRelayServer::bind_with_connector(
            &ServerConfig::new("127.0.0.1", 0),
            Unavailable,
        )
        .await
        .unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let running = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
