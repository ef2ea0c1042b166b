//! Quizroom client - live quiz session synchronization
//!
//! This crate keeps an admin console and any number of player screens in
//! step with one authoritative quiz session:
//!
//! - [`ws`]: the realtime link (reconnect, heartbeat, outbox)
//! - [`stores`]: the projection and its pure fold
//! - [`session`]: the per-game owner tying the two together
//! - [`active_game`]: the Dioxus provider and hooks

pub mod logging;

pub mod active_game;
pub mod config;
pub mod error;
pub mod session;
pub mod stores;
pub mod ws;

pub use active_game::{
    try_use_active_game, use_active_game, use_connection_state, ActiveGame, ActiveGameProvider,
    SharedConnector,
};
pub use config::SessionConfig;
pub use error::{ConfigError, MissingProviderError, TransportError};
pub use logging::init_tracing;
pub use session::{CommandSender, Diagnostic, GameSession, SessionHost};
pub use stores::Projection;
pub use ws::{ConnectionState, Connector, MemoryConnector, TungsteniteConnector};
