use std::io::{self, ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_into, Envelope, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete envelopes to any `Write` stream.
///
/// Header and body are staged into one buffer and handed to the stream
/// together, so two writers sharing a stream never interleave mid-envelope.
pub struct EnvelopeWriter<T> {
    inner: T,
    staging: BytesMut,
    config: FrameConfig,
}

impl<T: Write> EnvelopeWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            staging: BytesMut::new(),
            config,
        }
    }

    /// Forward an envelope read from another stream unchanged.
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        self.send(envelope.body())
    }

    /// Frame `body` and write it out, then flush.
    ///
    /// A body over the cap fails with [`FrameError::MessageTooLarge`] and
    /// nothing reaches the stream.
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size;
        if body.len() > max {
            return Err(FrameError::MessageTooLarge {
                size: body.len(),
                max,
            });
        }

        self.staging.clear();
        self.staging.reserve(HEADER_SIZE + body.len());
        encode_into(body, &mut self.staging)?;

        let mut pending: &[u8] = &self.staging;
        while !pending.is_empty() {
            match retry_interrupted(|| self.inner.write(pending))? {
                0 => return Err(FrameError::PeerClosed),
                n => pending = &pending[n..],
            }
        }
        retry_interrupted(|| self.inner.flush())?;

        trace!(len = body.len(), "envelope written");
        Ok(())
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Repeat `op` across `Interrupted` only. An expired send timeout shows up
/// as `WouldBlock`/`TimedOut` and must reach the caller.
fn retry_interrupted<R>(mut op: impl FnMut() -> io::Result<R>) -> Result<R> {
    loop {
        match op() {
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            other => return other.map_err(FrameError::Io),
        }
    }
}
