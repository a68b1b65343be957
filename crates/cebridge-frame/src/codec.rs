use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Envelope header: little-endian body length (4 bytes).
pub const HEADER_SIZE: usize = 4;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One length-prefixed message.
///
/// The length is always derived from the body, so an `Envelope` can never
/// carry a prefix that disagrees with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    body: Bytes,
}

impl Envelope {
    /// Wrap a body.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// The message body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the envelope and return the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Encode a body into a fresh wire buffer.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length       │ Body             │
/// │ (4B LE u32)  │ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
pub fn encode(body: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + body.len());
    encode_into(body, &mut dst)?;
    Ok(dst.freeze())
}

/// Append an encoded envelope to `dst`.
pub fn encode_into(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(FrameError::MessageTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Parse the length prefix from the first four bytes of `src`.
pub fn decode_header(src: &[u8]) -> Result<u32> {
    let Some(prefix) = src.get(..HEADER_SIZE) else {
        return Err(FrameError::Framing(format!(
            "need {HEADER_SIZE} header bytes, have {}",
            src.len()
        )));
    };
    let mut prefix = prefix;
    Ok(prefix.get_u32_le())
}

/// Apply the size cap to a declared length.
pub fn check_length(length: u32, max_payload: usize) -> Result<usize> {
    let length = length as usize;
    if length > max_payload {
        return Err(FrameError::MessageTooLarge {
            size: length,
            max: max_payload,
        });
    }
    Ok(length)
}

/// Decode an envelope from an accumulation buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// The cap is checked as soon as the header is available, before waiting
/// for any of the body. On success the envelope bytes are consumed.
pub fn decode_envelope(src: &mut BytesMut, max_payload: usize) -> Result<Option<Envelope>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let length = check_length(decode_header(&src[..])?, max_payload)?;
    let total = HEADER_SIZE + length;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(length).freeze();
    Ok(Some(Envelope { body }))
}

/// Configuration for envelope readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
