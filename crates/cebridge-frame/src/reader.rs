use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{check_length, decode_header, Envelope, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete envelopes from any `Read` stream.
///
/// Reads are exact: the header is read on its own, the cap is checked, and
/// only then is the body requested. Nothing beyond the current envelope is
/// ever pulled off the stream, so a reader can be built over `&mut stream`
/// for a single message and dropped again.
pub struct EnvelopeReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a new envelope reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new envelope reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// - EOF before any header byte: [`FrameError::PeerClosed`]
    /// - EOF inside the header: [`FrameError::Framing`]
    /// - declared length over the cap: [`FrameError::MessageTooLarge`], no body read
    /// - EOF before any body byte: [`FrameError::PeerClosed`]
    /// - EOF inside the body: [`FrameError::IncompleteMessage`]
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        let length = self.read_length()?;

        let mut body = BytesMut::zeroed(length);
        let received = read_full(&mut self.inner, &mut body)?;
        if received < length {
            if received == 0 {
                return Err(FrameError::PeerClosed);
            }
            return Err(FrameError::IncompleteMessage {
                expected: length,
                received,
            });
        }

        trace!(len = length, "read envelope");
        Ok(Envelope::new(body.freeze()))
    }

    /// Read and validate the header only.
    pub fn read_length(&mut self) -> Result<usize> {
        let mut header = [0u8; HEADER_SIZE];
        let received = read_full(&mut self.inner, &mut header)?;
        match received {
            0 => Err(FrameError::PeerClosed),
            HEADER_SIZE => check_length(decode_header(&header)?, self.config.max_payload_size),
            partial => Err(FrameError::Framing(format!(
                "stream ended after {partial} of {HEADER_SIZE} header bytes"
            ))),
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Fill `buf` until it is full or the stream reports EOF.
///
/// Returns how many bytes were read.
fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}
