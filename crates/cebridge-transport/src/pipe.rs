//! Windows named pipe client for the instrument channel.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::ChannelStream;

/// Build the `\\.\pipe\<name>` path for a pipe name.
pub fn pipe_path(name: &str) -> String {
    format!(r"\\.\pipe\{name}")
}

/// Open an existing named pipe for synchronous read/write.
///
/// Fails with `NotFound` when the instrument has not created the pipe, and
/// with `ERROR_PIPE_BUSY` (raw os error 231) when every instance is taken.
pub fn open(path: &Path) -> Result<ChannelStream> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| TransportError::Connect {
            endpoint: path.display().to_string(),
            source: e,
        })?;
    debug!(?path, "opened named pipe");
    Ok(ChannelStream::from_pipe(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_path_uses_local_namespace() {
        assert_eq!(pipe_path("CE_MCP_Bridge_v99"), r"\\.\pipe\CE_MCP_Bridge_v99");
    }
}
