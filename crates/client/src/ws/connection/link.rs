//! The seam between the connection loop and a concrete transport.

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

use crate::error::TransportError;

/// A transport-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Ping,
    Pong,
    Close,
}

/// An open bidirectional link to the session server.
///
/// The link is considered lost as soon as `incoming` yields `None` or a send
/// on `outgoing` fails.
pub struct Link {
    pub(crate) outgoing: UnboundedSender<WireFrame>,
    pub(crate) incoming: UnboundedReceiver<WireFrame>,
    reader: Option<AbortHandle>,
}

impl Link {
    pub fn new(outgoing: UnboundedSender<WireFrame>, incoming: UnboundedReceiver<WireFrame>) -> Self {
        Self {
            outgoing,
            incoming,
            reader: None,
        }
    }

    /// Attach the task pumping `incoming`; it is aborted when the link is
    /// dropped so a half-dead socket cannot outlive its link.
    pub fn with_reader(mut self, reader: AbortHandle) -> Self {
        self.reader = Some(reader);
        self
    }

    pub(crate) fn send(&self, frame: WireFrame) -> Result<(), TransportError> {
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::LinkClosed)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Opens links for a game. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, game_id: &str) -> Result<Link, TransportError>;
}
