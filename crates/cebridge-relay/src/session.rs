use std::fmt;
use std::io::{Read, Write};

use cebridge_frame::{Envelope, EnvelopeReader, EnvelopeWriter, FrameConfig, FrameError};
use tracing::{debug, warn};

/// Why a session stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// The network peer closed cleanly between requests.
    ClientClosed,
    /// Reading from or writing to the network peer failed.
    ClientError(FrameError),
    /// Reading from or writing to the instrument failed.
    ChannelError(FrameError),
}

impl SessionEnd {
    pub fn is_clean(&self) -> bool {
        matches!(self, SessionEnd::ClientClosed)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ClientClosed => f.write_str("client closed"),
            SessionEnd::ClientError(e) => write!(f, "client error: {e}"),
            SessionEnd::ChannelError(e) => write!(f, "channel error: {e}"),
        }
    }
}

/// Outcome of [`Session::run`].
#[derive(Debug)]
pub struct SessionSummary {
    /// Completed request/response round trips.
    pub exchanges: u64,
    pub end: SessionEnd,
}

/// One accepted connection paired with its own instrument handle.
///
/// Messages are relayed as opaque envelopes: request in, request out to the
/// instrument, response back. Both streams are dropped when the session ends.
pub struct Session<N, C> {
    id: String,
    network: N,
    channel: C,
    config: FrameConfig,
}

impl<N: Read + Write, C: Read + Write> Session<N, C> {
    pub fn new(id: impl Into<String>, network: N, channel: C, config: FrameConfig) -> Self {
        Self {
            id: id.into(),
            network,
            channel,
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pump envelopes until either side closes or fails.
    pub fn run(mut self) -> SessionSummary {
        let mut exchanges = 0u64;
        let end = loop {
            match self.exchange() {
                Ok(()) => exchanges += 1,
                Err(end) => break end,
            }
        };

        match &end {
            SessionEnd::ClientClosed => {
                debug!(session = %self.id, exchanges, "session closed by client")
            }
            other => warn!(session = %self.id, exchanges, reason = %other, "session torn down"),
        }
        SessionSummary { exchanges, end }
    }

    /// Relay one request and its response.
    pub fn exchange(&mut self) -> Result<(), SessionEnd> {
        let request = self.read_network().map_err(|e| {
            if e.is_peer_closed() {
                SessionEnd::ClientClosed
            } else {
                SessionEnd::ClientError(e)
            }
        })?;
        debug!(session = %self.id, len = request.len(), "request");

        EnvelopeWriter::with_config(&mut self.channel, self.config.clone())
            .write_envelope(&request)
            .map_err(SessionEnd::ChannelError)?;
        let response = EnvelopeReader::with_config(&mut self.channel, self.config.clone())
            .read_envelope()
            .map_err(SessionEnd::ChannelError)?;
        debug!(session = %self.id, len = response.len(), "response");

        EnvelopeWriter::with_config(&mut self.network, self.config.clone())
            .write_envelope(&response)
            .map_err(SessionEnd::ClientError)
    }

    fn read_network(&mut self) -> Result<Envelope, FrameError> {
        EnvelopeReader::with_config(&mut self.network, self.config.clone()).read_envelope()
    }
}
