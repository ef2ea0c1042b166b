//! In-process links, for tests and for embedding a session next to its
//! server in the same process.
//!
//! Every successful [`MemoryConnector::connect`] hands the server half of
//! the link to the paired [`MemoryListener`] as a [`MemoryPeer`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use quizroom_shared::{decode_command, encode_event, ClientCommand, ServerEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::link::{Connector, Link, WireFrame};
use crate::error::TransportError;

struct MemoryInner {
    peers: UnboundedSender<MemoryPeer>,
    refusals: AtomicU32,
    attempts: AtomicU32,
}

#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<MemoryInner>,
}

impl MemoryConnector {
    pub fn pair() -> (Self, MemoryListener) {
        let (peers, incoming) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(MemoryInner {
                peers,
                refusals: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
            }),
        };
        (connector, MemoryListener { incoming })
    }

    /// Make the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: u32) {
        self.inner.refusals.store(count, Ordering::SeqCst);
    }

    /// Connection attempts made so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, game_id: &str) -> Result<Link, TransportError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .inner
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Refused(game_id.to_string()));
        }

        let (to_client, client_incoming) = mpsc::unbounded_channel();
        let (client_outgoing, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            game_id: game_id.to_string(),
            outgoing: to_client,
            incoming: from_client,
        };
        self.inner
            .peers
            .send(peer)
            .map_err(|_| TransportError::Connect {
                url: format!("memory://{}", game_id),
                reason: "listener dropped".to_string(),
            })?;
        Ok(Link::new(client_outgoing, client_incoming))
    }
}

pub struct MemoryListener {
    incoming: UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Wait for the next client link.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }

    /// A client link that is already waiting, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.try_recv().ok()
    }
}

/// Server side of one in-memory link. Dropping it closes the link.
pub struct MemoryPeer {
    pub game_id: String,
    outgoing: UnboundedSender<WireFrame>,
    incoming: UnboundedReceiver<WireFrame>,
}

impl MemoryPeer {
    pub fn send(&self, frame: WireFrame) -> Result<(), TransportError> {
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::LinkClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(WireFrame::Text(text.into()))
    }

    pub fn send_event(&self, event: &ServerEvent) -> Result<(), TransportError> {
        self.send_text(encode_event(event)?)
    }

    pub async fn recv(&mut self) -> Option<WireFrame> {
        self.incoming.recv().await
    }

    /// Next command from the client. Pings are answered along the way and
    /// undecodable frames skipped.
    pub async fn recv_command(&mut self) -> Option<ClientCommand> {
        loop {
            match self.incoming.recv().await? {
                WireFrame::Text(text) => match decode_command(&text) {
                    Ok(command) => return Some(command),
                    Err(e) => crate::log_warn!("Memory peer skipped frame: {}", e),
                },
                WireFrame::Ping => {
                    let _ = self.send(WireFrame::Pong);
                }
                WireFrame::Pong => {}
                WireFrame::Close => return None,
            }
        }
    }
}
