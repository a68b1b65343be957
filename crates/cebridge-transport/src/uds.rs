use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::stream::ChannelStream;

/// `sun_path` capacity, including the trailing NUL.
#[cfg(target_os = "linux")]
const SUN_PATH_CAPACITY: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_CAPACITY: usize = 104;

/// Mode applied to a freshly bound channel socket.
const CHANNEL_SOCKET_MODE: u32 = 0o600;

/// Unix domain socket side of the instrument channel.
///
/// The relay only calls [`UnixDomainSocket::connect`]. Binding is for the
/// instrument end, or anything standing in for it. A bound socket file is
/// unlinked on drop unless something else has replaced it in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    owner: SocketFile,
}

/// Device/inode pair of the socket file this endpoint created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SocketFile {
    dev: u64,
    ino: u64,
}

impl SocketFile {
    fn stat(path: &Path) -> io::Result<Option<Self>> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(meta.file_type().is_socket().then(|| Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }))
    }
}

impl UnixDomainSocket {
    /// Bind a channel socket at `path`, replacing a leftover socket file.
    ///
    /// A non-socket file at `path` is never touched; the bind fails instead.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fits_sun_path(&path)?;
        let bind_failed = |source: io::Error| TransportError::Bind {
            endpoint: path.display().to_string(),
            source,
        };

        clear_leftover(&path).map_err(bind_failed)?;
        let listener = UnixListener::bind(&path).map_err(bind_failed)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(CHANNEL_SOCKET_MODE))
            .map_err(bind_failed)?;
        let owner = SocketFile::stat(&path)
            .map_err(bind_failed)?
            .ok_or_else(|| bind_failed(io::Error::other("bound path is not a socket")))?;

        info!(?path, "instrument channel socket bound");
        Ok(Self {
            listener,
            path,
            owner,
        })
    }

    /// Wait for the next channel handle (blocking).
    pub fn accept(&self) -> Result<ChannelStream> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "channel handle accepted");
        Ok(ChannelStream::from_unix(stream))
    }

    /// Open a new handle to the channel at `path` (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<ChannelStream> {
        let path = path.as_ref();
        fits_sun_path(path)?;
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            endpoint: path.display().to_string(),
            source,
        })?;
        debug!(?path, "channel handle opened");
        Ok(ChannelStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        match SocketFile::stat(&self.path) {
            Ok(Some(current)) if current == self.owner => {
                if let Err(err) = std::fs::remove_file(&self.path) {
                    warn!(path = ?self.path, error = %err, "failed to unlink channel socket");
                }
            }
            Ok(_) => debug!(path = ?self.path, "channel socket replaced; leaving it"),
            Err(_) => {}
        }
    }
}

fn fits_sun_path(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len < SUN_PATH_CAPACITY {
        return Ok(());
    }
    Err(TransportError::PathTooLong {
        path: path.to_path_buf(),
        len,
        max: SUN_PATH_CAPACITY,
    })
}

/// Unlink a socket file left behind by a previous instrument process.
fn clear_leftover(path: &Path) -> io::Result<()> {
    match SocketFile::stat(path) {
        Ok(Some(_)) => {
            debug!(?path, "removing leftover channel socket");
            std::fs::remove_file(path)
        }
        Ok(None) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
