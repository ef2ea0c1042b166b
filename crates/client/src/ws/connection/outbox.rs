//! Bounded queue of commands waiting for an open link.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use quizroom_shared::ClientCommand;
use tokio::sync::Notify;

/// FIFO of pending commands. Beyond `capacity` the oldest entry is evicted.
#[derive(Debug)]
pub struct Outbox {
    queue: VecDeque<ClientCommand>,
    capacity: usize,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a command, returning the one evicted to make room, if any.
    pub fn push(&mut self, command: ClientCommand) -> Option<ClientCommand> {
        let evicted = if self.queue.len() >= self.capacity {
            self.queue.pop_front()
        } else {
            None
        };
        self.queue.push_back(command);
        evicted
    }

    /// Put back a command whose send failed so it goes out first on the next
    /// link. Dropped if newer commands already fill the queue.
    pub fn requeue(&mut self, command: ClientCommand) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_front(command);
        true
    }

    pub fn pop(&mut self) -> Option<ClientCommand> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// The outbox shared between command senders and the connection loop.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    outbox: Mutex<Outbox>,
    ready: Notify,
    closed: AtomicBool,
}

impl CommandQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            outbox: Mutex::new(Outbox::new(capacity)),
            ready: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a command for delivery. Returns `false` once the queue is closed.
    pub(crate) fn push(&self, command: ClientCommand) -> bool {
        if self.is_closed() {
            return false;
        }
        if let Some(evicted) = self.lock().push(command) {
            crate::log_warn!("Outbox full, dropping oldest command {}", evicted.kind());
        }
        self.ready.notify_one();
        true
    }

    pub(crate) fn requeue(&self, command: ClientCommand) {
        if self.is_closed() {
            return;
        }
        let kind = command.kind();
        if !self.lock().requeue(command) {
            crate::log_warn!("Outbox full, could not requeue {}", kind);
        }
    }

    pub(crate) fn pop(&self) -> Option<ClientCommand> {
        self.lock().pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Resolves after the next [`push`](Self::push).
    pub(crate) async fn ready(&self) {
        self.ready.notified().await
    }

    /// Refuse further commands and discard anything not yet flushed.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock().clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
