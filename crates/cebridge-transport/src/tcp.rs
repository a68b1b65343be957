use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default relay port.
pub const DEFAULT_PORT: u16 = 17171;

/// Default connect timeout for the client hop.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect to the relay server, trying every resolved address in turn.
///
/// Each address gets the full `timeout`. The error of the last attempt is
/// returned when none succeed.
pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let endpoint = format!("{host}:{port}");
    let addrs = resolve(host, port)?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%addr, "connected to relay server");
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        endpoint,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses to try")
        }),
    })
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::InvalidAddress {
            endpoint: format!("{host}:{port}"),
            reason: e.to_string(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::InvalidAddress {
            endpoint: format!("{host}:{port}"),
            reason: "host resolved to no addresses".to_string(),
        });
    }
    Ok(addrs)
}

/// Listening side of the network hop.
pub struct TcpRelayListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpRelayListener {
    /// Bind and listen. Port `0` picks an ephemeral port.
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let endpoint = format!("{host}:{port}");
        let addrs = resolve(host, port)?;
        let listener = TcpListener::bind(addrs.as_slice()).map_err(|e| TransportError::Bind {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            endpoint,
            source: e,
        })?;

        info!(%local_addr, "listening for relay connections");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted relay connection");
        Ok((stream, peer))
    }

    /// The bound address (useful after binding port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
