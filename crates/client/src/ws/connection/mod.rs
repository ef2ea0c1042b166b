//! Session connection with state tracking, auto-reconnect and heartbeat.
//!
//! A [`WsConnection`] owns one background task per game. The task walks the
//! state machine
//!
//! ```text
//! Connecting -> Connected -> Reconnecting <-> Connected -> Closed
//! ```
//!
//! re-announcing itself with a `JOIN` on every successful connect so the
//! server answers with a fresh snapshot. Commands issued while no link is
//! open wait in a bounded [`Outbox`].

mod connection_memory;
mod connection_native;
mod link;
mod outbox;

use std::sync::Arc;
use std::time::Duration;

use quizroom_shared::{encode_command, ClientCommand, GameId};
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use connection_memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use connection_native::{socket_url, TungsteniteConnector};
pub use link::{Connector, Link, WireFrame};
pub use outbox::Outbox;

use crate::error::TransportError;
use outbox::CommandQueue;

/// Connection state for a game session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connection attempt(s); never been connected yet.
    Connecting,
    Connected,
    /// Lost an established link; `attempt` counts retries since.
    Reconnecting { attempt: u32 },
    /// Torn down. Terminal.
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Ceiling of the first retry delay
    pub initial_delay: Duration,
    /// Upper bound for any retry delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Upper bound of the delay before retry number `attempt` (0-based).
    pub fn ceiling_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }

    /// Delay before retry number `attempt`, drawn uniformly from
    /// `[0, ceiling]` ("full jitter").
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for_attempt(attempt).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Keepalive settings. A link with no inbound traffic for `timeout` is
/// treated as dead.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Everything the connection loop needs besides the game and connector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
    pub outbox_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            outbox_capacity: 32,
        }
    }
}

/// Handle for sending commands through a session connection
#[derive(Clone)]
pub struct WsHandle {
    queue: Arc<CommandQueue>,
    pub game_id: GameId,
}

impl WsHandle {
    /// Queue a command for the server. Fire-and-forget: it is delivered once
    /// a link is open, and silently ignored after the connection closed.
    pub fn send(&self, command: ClientCommand) {
        let kind = command.kind();
        if self.queue.push(command) {
            crate::log_debug!("Queued {} for game '{}'", kind, self.game_id);
        } else {
            crate::log_debug!("Connection for game '{}' closed, ignoring {}", self.game_id, kind);
        }
    }

    /// Commands waiting for a link.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// A managed connection to the session server for one game
pub struct WsConnection {
    game_id: GameId,
    state: Arc<watch::Sender<ConnectionState>>,
    queue: Arc<CommandQueue>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WsConnection {
    /// Start connecting. Text frames received from the server are forwarded,
    /// in arrival order, to `inbound`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        game_id: impl Into<GameId>,
        join: ClientCommand,
        connector: Arc<dyn Connector>,
        options: ConnectionOptions,
        inbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        let game_id = game_id.into();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let queue = Arc::new(CommandQueue::new(options.outbox_capacity));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_connection_loop(LoopContext {
            game_id: game_id.clone(),
            join,
            connector,
            options,
            inbound,
            state: state.clone(),
            queue: queue.clone(),
            cancel: cancel.clone(),
        }));

        Self {
            game_id,
            state,
            queue,
            cancel,
            task: Some(task),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Get a handle for sending commands
    pub fn handle(&self) -> WsHandle {
        WsHandle {
            queue: self.queue.clone(),
            game_id: self.game_id.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Stop retrying, drop the link and discard unsent commands.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        crate::log_info!("Closing connection for game '{}'", self.game_id);
        self.cancel.cancel();
        self.queue.close();
        self.state.send_replace(ConnectionState::Closed);
    }

    /// [`close`](Self::close) and wait for the background task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

struct LoopContext {
    game_id: GameId,
    join: ClientCommand,
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    inbound: mpsc::UnboundedSender<String>,
    state: Arc<watch::Sender<ConnectionState>>,
    queue: Arc<CommandQueue>,
    cancel: CancellationToken,
}

impl LoopContext {
    /// `Closed` is sticky: once the owner closed the connection the loop
    /// cannot move it back.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if current.is_closed() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

enum LinkEnd {
    Cancelled,
    Lost(&'static str),
    /// No inbound traffic within the heartbeat timeout.
    Silent,
}

/// The connection management loop
async fn run_connection_loop(ctx: LoopContext) {
    let mut attempt = 0u32;
    let mut connected_once = false;

    loop {
        if connected_once {
            ctx.set_state(ConnectionState::Reconnecting { attempt });
        } else {
            ctx.set_state(ConnectionState::Connecting);
        }

        let attempt_timeout = ctx.options.heartbeat.timeout;
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            result = tokio::time::timeout(attempt_timeout, ctx.connector.connect(&ctx.game_id)) => {
                result.unwrap_or_else(|_| Err(TransportError::TimedOut(ctx.game_id.clone())))
            }
        };
        // A link that finished opening after close() is dropped unused
        if ctx.cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(link) => {
                connected_once = true;
                attempt = 0;
                ctx.set_state(ConnectionState::Connected);
                crate::log_info!("Connected to game '{}'", ctx.game_id);

                match run_link(&ctx, link).await {
                    LinkEnd::Cancelled => break,
                    LinkEnd::Lost(reason) => {
                        crate::log_warn!("Link for game '{}' lost: {}", ctx.game_id, reason);
                    }
                    LinkEnd::Silent => {
                        crate::log_warn!(
                            "Heartbeat timeout for game '{}', reconnecting now",
                            ctx.game_id
                        );
                        continue;
                    }
                }
            }
            Err(e) => {
                crate::log_error!("Connection error for game '{}': {}", ctx.game_id, e);
            }
        }

        let delay = ctx.options.reconnect.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        if connected_once {
            ctx.set_state(ConnectionState::Reconnecting { attempt });
        }
        crate::log_info!(
            "Reconnecting to game '{}' in {}ms (attempt {})",
            ctx.game_id,
            delay.as_millis(),
            attempt
        );
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.set_state(ConnectionState::Closed);
    crate::log_debug!("Connection loop for game '{}' stopped", ctx.game_id);
}

/// Drive one open link until it is lost or the connection is closed.
async fn run_link(ctx: &LoopContext, mut link: Link) -> LinkEnd {
    match encode_command(&ctx.join) {
        Ok(text) => {
            if link.send(WireFrame::Text(text)).is_err() {
                return LinkEnd::Lost("closed before JOIN");
            }
        }
        Err(e) => crate::log_error!("Could not encode JOIN: {}", e),
    }

    let heartbeat = &ctx.options.heartbeat;
    let mut ticker = tokio::time::interval(heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;
    let mut last_seen = Instant::now();

    loop {
        while let Some(command) = ctx.queue.pop() {
            let text = match encode_command(&command) {
                Ok(text) => text,
                Err(e) => {
                    crate::log_error!("Dropping command: {}", e);
                    continue;
                }
            };
            if link.send(WireFrame::Text(text)).is_err() {
                ctx.queue.requeue(command);
                return LinkEnd::Lost("closed while sending");
            }
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                let _ = link.send(WireFrame::Close);
                return LinkEnd::Cancelled;
            }
            _ = ctx.queue.ready() => {}
            frame = link.incoming.recv() => match frame {
                Some(WireFrame::Text(text)) => {
                    last_seen = Instant::now();
                    if ctx.inbound.send(text).is_err() {
                        // Nobody is folding events anymore
                        return LinkEnd::Cancelled;
                    }
                }
                Some(WireFrame::Ping) => {
                    last_seen = Instant::now();
                    let _ = link.send(WireFrame::Pong);
                }
                Some(WireFrame::Pong) => last_seen = Instant::now(),
                Some(WireFrame::Close) | None => return LinkEnd::Lost("closed by server"),
            },
            _ = ticker.tick() => {
                if last_seen.elapsed() >= heartbeat.timeout {
                    return LinkEnd::Silent;
                }
                if link.send(WireFrame::Ping).is_err() {
                    return LinkEnd::Lost("closed while sending keepalive");
                }
            }
        }
    }
}
