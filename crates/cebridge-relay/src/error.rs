use cebridge_frame::FrameError;
use cebridge_transport::TransportError;

/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error (connect, bind, accept).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error (framing, cap, truncation, peer close).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every attempt in the retry budget failed.
    #[error("relay server {endpoint} unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<RelayError>,
    },
}

impl RelayError {
    /// Whether the client should reconnect and try again.
    ///
    /// Oversized messages are not retried: the server would send the same
    /// response again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport(_) | RelayError::Json(_) => true,
            RelayError::Frame(FrameError::MessageTooLarge { .. }) => false,
            RelayError::Frame(_) => true,
            RelayError::Config(_) | RelayError::Unreachable { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
