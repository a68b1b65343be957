use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cebridge_frame::FrameConfig;
use cebridge_transport::{LocalChannel, TcpRelayListener};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connector::InstrumentConnector;
use crate::error::Result;
use crate::session::{Session, SessionSummary};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Bridges TCP connections to the instrument, one thread per session.
pub struct RelayServer<K = LocalChannel> {
    listener: TcpRelayListener,
    connector: Arc<K>,
    frame_config: FrameConfig,
    shutdown: Arc<AtomicBool>,
    next_session: AtomicU64,
}

impl RelayServer<LocalChannel> {
    /// Bind the listener; sessions open the configured local channel.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_with_connector(config, LocalChannel::new(config.channel.as_str()))
    }
}

impl<K: InstrumentConnector> RelayServer<K> {
    /// Bind the listener with a custom instrument connector.
    pub fn bind_with_connector(config: &ServerConfig, connector: K) -> Result<Self> {
        let listener = TcpRelayListener::bind(&config.bind_host, config.bind_port)?;
        info!(
            addr = %listener.local_addr(),
            instrument = %connector.describe(),
            "relay server ready"
        );
        Ok(Self {
            listener,
            connector: Arc::new(connector),
            frame_config: config.frame_config(),
            shutdown: Arc::new(AtomicBool::new(false)),
            next_session: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// A handle that stops [`RelayServer::serve`] from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            wake_addr: wake_addr(self.local_addr()),
        }
    }

    /// Accept connections until shut down.
    ///
    /// Accept errors are logged and the loop continues. Sessions already
    /// running are left to finish on their own.
    pub fn serve(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    self.handle_connection(stream, peer);
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
        info!(addr = %self.local_addr(), "relay server stopped");
        Ok(())
    }

    /// Start a session for an accepted connection on its own thread.
    ///
    /// Returns `None` if the thread could not be spawned; the connection is
    /// dropped in that case.
    pub fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Option<thread::JoinHandle<Option<SessionSummary>>> {
        let id = format!(
            "session-{}",
            self.next_session.fetch_add(1, Ordering::Relaxed)
        );
        let connector = Arc::clone(&self.connector);
        let frame_config = self.frame_config.clone();

        let spawned = thread::Builder::new().name(id.clone()).spawn({
            let id = id.clone();
            move || run_session(connector.as_ref(), id, stream, peer, frame_config)
        });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(session = %id, %peer, error = %e, "failed to spawn session thread");
                None
            }
        }
    }
}

/// Open the instrument and pump one session to completion.
///
/// A connection whose channel cannot be opened is closed without a reply.
fn run_session<K: InstrumentConnector>(
    connector: &K,
    id: String,
    stream: TcpStream,
    peer: SocketAddr,
    frame_config: FrameConfig,
) -> Option<SessionSummary> {
    let channel = match connector.open() {
        Ok(channel) => channel,
        Err(e) => {
            warn!(
                session = %id,
                %peer,
                instrument = %connector.describe(),
                error = %e,
                "instrument channel unavailable, dropping connection"
            );
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return None;
        }
    };
    debug!(session = %id, %peer, "session started");
    Some(Session::new(id, stream, channel, frame_config).run())
}

/// Stops a running [`RelayServer`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Flag the server to stop and wake its blocking accept.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = TcpStream::connect_timeout(&self.wake_addr, Duration::from_secs(1));
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}

/// Bind on `bind_host:bind_port` with the default channel and serve forever.
pub fn serve(bind_host: &str, bind_port: u16) -> Result<()> {
    RelayServer::bind(&ServerConfig::new(bind_host, bind_port))?.serve()
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use cebridge_frame::{EnvelopeReader, EnvelopeWriter};
    use cebridge_transport::TransportError;
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::client::RelayClient;
    use crate::config::ClientConfig;
    use crate::connector::FnConnector;
    use crate::error::RelayError;

    /// Instrument stand-in: answers `{"result": "<method>"}` on every handle.
    fn spawn_instrument() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                thread::spawn(move || loop {
                    let Ok(request) = EnvelopeReader::new(&mut stream).read_envelope() else {
                        break;
                    };
                    let request: Value = serde_json::from_slice(request.body()).unwrap();
                    let body = serde_json::to_vec(&json!({"result": request["method"]})).unwrap();
                    if EnvelopeWriter::new(&mut stream).send(&body).is_err() {
                        break;
                    }
                });
            }
        });
        addr
    }

    fn tcp_connector(addr: SocketAddr) -> impl InstrumentConnector {
        FnConnector::new(format!("tcp://{addr}"), move || {
            TcpStream::connect(addr).map_err(TransportError::from)
        })
    }

    fn start<K: InstrumentConnector>(
        connector: K,
    ) -> (SocketAddr, ShutdownHandle, thread::JoinHandle<Result<()>>) {
        let server = RelayServer::bind_with_connector(&ServerConfig::new("127.0.0.1", 0), connector)
            .unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let join = thread::spawn(move || server.serve());
        (addr, handle, join)
    }

    fn client(addr: SocketAddr) -> RelayClient {
        RelayClient::new(
            ClientConfig::new("127.0.0.1", addr.port())
                .with_connect_timeout(Duration::from_secs(2))
                .with_io_timeout(Some(Duration::from_secs(5))),
        )
    }

    #[test]
    fn relays_calls_to_instrument() {
        let (addr, shutdown, join) = start(tcp_connector(spawn_instrument()));

        let mut client = client(addr);
        assert_eq!(client.call("ping", Map::new()).unwrap(), json!("ping"));
        assert_eq!(
            client.call("get_version", Map::new()).unwrap(),
            json!("get_version")
        );

        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn unavailable_channel_drops_connection() {
        let connector = FnConnector::new("missing", || -> cebridge_transport::Result<TcpStream> {
            Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )))
        });
        let (addr, shutdown, join) = start(connector);

        let err = client(addr).call("read_memory", Map::new()).unwrap_err();
        assert!(matches!(err, RelayError::Unreachable { attempts: 2, .. }));

        shutdown.shutdown();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn shutdown_stops_idle_server() {
        let (_, shutdown, join) = start(tcp_connector(spawn_instrument()));
        assert!(!shutdown.is_shutdown());
        shutdown.shutdown();
        assert!(shutdown.is_shutdown());
        join.join().unwrap().unwrap();
    }

    #[test]
    fn sessions_are_numbered() {
        let server = RelayServer::bind_with_connector(
            &ServerConfig::new("127.0.0.1", 0),
            tcp_connector(spawn_instrument()),
        )
        .unwrap();
        let addr = server.local_addr();

        for expected in ["session-1", "session-2"] {
            let remote = TcpStream::connect(addr).unwrap();
            let (stream, peer) = server.listener.accept().unwrap();
            let handle = server.handle_connection(stream, peer).unwrap();
            assert_eq!(handle.thread().name(), Some(expected));
            drop(remote);
            let summary = handle.join().unwrap().unwrap();
            assert_eq!(summary.exchanges, 0);
            assert!(summary.end.is_clean());
        }
    }

    #[test]
    fn wake_addr_maps_unspecified_to_loopback() {
        let addr: SocketAddr = "0.0.0.0:17171".parse().unwrap();
        assert_eq!(wake_addr(addr), "127.0.0.1:17171".parse::<SocketAddr>().unwrap());
        let addr: SocketAddr = "[::]:9".parse().unwrap();
        assert_eq!(wake_addr(addr), "[::1]:9".parse::<SocketAddr>().unwrap());
        let addr: SocketAddr = "10.1.2.3:9".parse().unwrap();
        assert_eq!(wake_addr(addr), addr);
    }
}
