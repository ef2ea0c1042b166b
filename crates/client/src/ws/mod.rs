//! Realtime link to the quiz session server.
//!
//! This module provides:
//! - Connection management with auto-reconnect and heartbeat
//! - A bounded outbox for commands issued while the link is down
//! - Pluggable transports (native WebSocket, in-memory)
//!
//! # Architecture
//!
//! ```text
//!    WsHandle::send ──► Outbox ──┐
//!                                ▼
//!                      ┌───────────────────┐      Connector
//!                      │   WsConnection    │ ◄──────────────── TungsteniteConnector
//!                      │ (reconnect loop)  │                   MemoryConnector
//!                      └───────────────────┘
//!                                │ text frames, in order
//!                                ▼
//!                         GameSession fold
//! ```
//!
//! Consumers do not read frames directly. The session decodes and folds them
//! into a projection, and components read that projection.

mod connection;

pub use connection::{
    socket_url, ConnectionOptions, ConnectionState, Connector, HeartbeatConfig, Link,
    MemoryConnector, MemoryListener, MemoryPeer, Outbox, ReconnectConfig, TungsteniteConnector,
    WireFrame, WsConnection, WsHandle,
};
