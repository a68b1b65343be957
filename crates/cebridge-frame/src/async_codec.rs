//! `tokio_util::codec` adapter for envelopes.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_envelope, encode_into, Envelope, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Envelope codec for `Framed` tokio streams.
///
/// The cap is enforced from the header alone, before any body bytes are
/// buffered.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_payload_size: usize,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        decode_envelope(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        if let Some(envelope) = self.decode(src)? {
            return Ok(Some(envelope));
        }
        match src.len() {
            0 => Ok(None),
            n if n < HEADER_SIZE => Err(FrameError::Framing(format!(
                "stream ended after {n} of {HEADER_SIZE} header bytes"
            ))),
            n => {
                let expected = crate::codec::decode_header(&src[..])? as usize;
                let received = n - HEADER_SIZE;
                if received == 0 {
                    Err(FrameError::PeerClosed)
                } else {
                    Err(FrameError::IncompleteMessage { expected, received })
                }
            }
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<Bytes>>::encode(self, item.into_body(), dst)
    }
}

impl Encoder<Bytes> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::MessageTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_into(&item, dst)
    }
}
