//! Tokio counterparts of the blocking transports.

use tracing::{debug, info};

use crate::channel::LocalChannel;
use crate::error::{Result, TransportError};

/// Async handle to the instrument's local channel.
#[cfg(unix)]
pub type AsyncChannelStream = tokio::net::UnixStream;

/// Async handle to the instrument's local channel.
#[cfg(windows)]
pub type AsyncChannelStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// Bind a tokio listener for the network hop.
pub async fn bind_tcp(host: &str, port: u16) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| TransportError::Bind {
            endpoint: format!("{host}:{port}"),
            source: e,
        })?;
    if let Ok(local_addr) = listener.local_addr() {
        info!(%local_addr, "listening for relay connections");
    }
    Ok(listener)
}

impl LocalChannel {
    /// Open a fresh async handle to the instrument.
    pub async fn open_async(&self) -> Result<AsyncChannelStream> {
        let endpoint = self.path().display().to_string();
        #[cfg(unix)]
        let opened = tokio::net::UnixStream::connect(self.path()).await;
        #[cfg(windows)]
        let opened = tokio::net::windows::named_pipe::ClientOptions::new().open(self.path());

        let stream = opened.map_err(|source| TransportError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        debug!(%endpoint, "opened instrument channel");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn bind_and_connect() {
        let listener = bind_tcp("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut client = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        client.write_all(b"ping").await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"ping");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn open_async_fails_when_instrument_absent() {
        let channel = LocalChannel::from_path("/tmp/ceb-async-missing/channel.sock");
        let err = channel.open_async().await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
