use std::io::{Read, Write};

use crate::error::Result;

/// A connected handle to the instrument's local channel.
///
/// On Unix this wraps a Unix domain socket stream.
/// On Windows this wraps an opened named pipe client handle.
pub struct ChannelStream {
    inner: ChannelStreamInner,
}

enum ChannelStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    Pipe(std::fs::File),
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(windows)]
            ChannelStreamInner::Pipe(file) => file.read(buf),
        }
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(windows)]
            ChannelStreamInner::Pipe(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => stream.flush(),
            #[cfg(windows)]
            ChannelStreamInner::Pipe(file) => file.flush(),
        }
    }
}

impl ChannelStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ChannelStreamInner::Unix(stream),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_pipe(file: std::fs::File) -> Self {
        Self {
            inner: ChannelStreamInner::Pipe(file),
        }
    }

    /// Set read timeout on the underlying handle.
    ///
    /// Named pipe handles opened for synchronous I/O have no timeout knob; the
    /// call is accepted and ignored there.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
            #[cfg(windows)]
            ChannelStreamInner::Pipe(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying handle.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            #[cfg(windows)]
            ChannelStreamInner::Pipe(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            ChannelStreamInner::Unix(_) => "unix-domain-socket",
            #[cfg(windows)]
            ChannelStreamInner::Pipe(_) => "named-pipe",
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for ChannelStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self::from_unix(stream)
    }
}

impl std::fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn reads_and_writes_through_unix_pair() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut left = ChannelStream::from(left);
        let mut right = ChannelStream::from(right);

        left.write_all(b"abc").unwrap();
        left.flush().unwrap();

        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        assert_eq!(left.transport_name(), "unix-domain-socket");
    }

    #[test]
    fn debug_names_the_transport() {
        let (left, _right) = UnixStream::pair().unwrap();
        let left = ChannelStream::from(left);
        left.set_read_timeout(Some(std::time::Duration::from_millis(50))).unwrap();
        assert!(format!("{left:?}").contains("unix-domain-socket"));
    }
}
