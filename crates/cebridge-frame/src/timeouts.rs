use std::time::Duration;

use cebridge_transport::ChannelStream;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

/// Streams whose blocking reads and writes can be bounded.
pub trait StreamTimeouts {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl StreamTimeouts for std::net::TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::net::TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::net::TcpStream::set_write_timeout(self, timeout)
    }
}

impl StreamTimeouts for ChannelStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        ChannelStream::set_read_timeout(self, timeout).map_err(transport_to_io)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        ChannelStream::set_write_timeout(self, timeout).map_err(transport_to_io)
    }
}

#[cfg(unix)]
impl StreamTimeouts for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }
}

impl FrameConfig {
    /// Apply the configured read/write timeouts to a stream.
    pub fn apply_timeouts<S: StreamTimeouts + ?Sized>(&self, stream: &S) -> Result<()> {
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(FrameError::Io)?;
        stream
            .set_write_timeout(self.write_timeout)
            .map_err(FrameError::Io)
    }
}

fn transport_to_io(err: cebridge_transport::TransportError) -> std::io::Error {
    match err {
        cebridge_transport::TransportError::Io(io)
        | cebridge_transport::TransportError::Accept(io) => io,
        cebridge_transport::TransportError::Bind { source, .. }
        | cebridge_transport::TransportError::Connect { source, .. } => source,
        other => std::io::Error::other(other.to_string()),
    }
}
