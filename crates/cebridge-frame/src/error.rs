/// Errors that can occur while framing envelopes.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is malformed or truncated.
    #[error("malformed length prefix: {0}")]
    Framing(String),

    /// The declared length exceeds the configured cap.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The stream ended after part of the body had arrived.
    #[error("incomplete message ({received} of {expected} body bytes)")]
    IncompleteMessage { expected: usize, received: usize },

    /// The peer closed the stream before sending anything of the message.
    #[error("peer closed the connection")]
    PeerClosed,

    /// An I/O error occurred while reading or writing envelopes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the error is an orderly close rather than a fault.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, FrameError::PeerClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
