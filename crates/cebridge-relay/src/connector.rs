use std::io::{Read, Write};

use cebridge_transport::{ChannelStream, LocalChannel};

/// Opens a fresh handle to the instrument for each session.
///
/// Handles are never shared between sessions; the server calls `open` once
/// per accepted connection.
pub trait InstrumentConnector: Send + Sync + 'static {
    type Stream: Read + Write + Send + 'static;

    fn open(&self) -> cebridge_transport::Result<Self::Stream>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

impl InstrumentConnector for LocalChannel {
    type Stream = ChannelStream;

    fn open(&self) -> cebridge_transport::Result<ChannelStream> {
        LocalChannel::open(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Adapts a closure into an [`InstrumentConnector`].
pub struct FnConnector<F> {
    open: F,
    label: String,
}

impl<F, S> FnConnector<F>
where
    F: Fn() -> cebridge_transport::Result<S> + Send + Sync + 'static,
    S: Read + Write + Send + 'static,
{
    pub fn new(label: impl Into<String>, open: F) -> Self {
        Self {
            open,
            label: label.into(),
        }
    }
}

impl<F, S> InstrumentConnector for FnConnector<F>
where
    F: Fn() -> cebridge_transport::Result<S> + Send + Sync + 'static,
    S: Read + Write + Send + 'static,
{
    type Stream = S;

    fn open(&self) -> cebridge_transport::Result<S> {
        (self.open)()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
