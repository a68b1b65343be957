use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::stream::ChannelStream;

/// Well-known name of the instrument's local channel.
pub const DEFAULT_CHANNEL_NAME: &str = "CE_MCP_Bridge_v99";

/// Address of the instrument's local channel.
///
/// A bare name maps to the platform's namespace: `\\.\pipe\<name>` on
/// Windows, `<tmp>/<name>.sock` on Unix. Anything containing a path
/// separator is used as a literal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChannel {
    name: String,
    path: PathBuf,
}

impl LocalChannel {
    /// Resolve a channel name (or explicit path) for this platform.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = resolve_path(&name);
        Self { name, path }
    }

    /// Use an explicit filesystem path for the channel.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    /// The configured channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved endpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh handle to the instrument (blocking).
    pub fn open(&self) -> Result<ChannelStream> {
        #[cfg(unix)]
        {
            crate::uds::UnixDomainSocket::connect(&self.path)
        }
        #[cfg(windows)]
        {
            crate::pipe::open(&self.path)
        }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_NAME)
    }
}

impl std::fmt::Display for LocalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn is_explicit_path(name: &str) -> bool {
    name.contains('/') || name.contains('\\')
}

#[cfg(unix)]
fn resolve_path(name: &str) -> PathBuf {
    if is_explicit_path(name) {
        PathBuf::from(name)
    } else {
        std::env::temp_dir().join(format!("{name}.sock"))
    }
}

#[cfg(windows)]
fn resolve_path(name: &str) -> PathBuf {
    if is_explicit_path(name) {
        PathBuf::from(name)
    } else {
        PathBuf::from(crate::pipe::pipe_path(name))
    }
}
