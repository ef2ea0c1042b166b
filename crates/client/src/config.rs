//! Session configuration from environment variables.

use quizroom_shared::{ClientCommand, PlayerId, Role};

use crate::error::ConfigError;
use crate::ws::{socket_url, ConnectionOptions, HeartbeatConfig, ReconnectConfig};

const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";
const DEFAULT_OUTBOX_CAPACITY: usize = 32;

/// How a client joins sessions: where the server is, who we are, and how
/// the link behaves.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub server_url: String,
    pub role: Role,
    /// Required for [`Role::Player`].
    pub player_id: Option<PlayerId>,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
    pub outbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            role: Role::Admin,
            player_id: None,
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn admin() -> Self {
        Self::default()
    }

    pub fn player(player_id: impl Into<PlayerId>) -> Self {
        Self {
            role: Role::Player,
            player_id: Some(player_id.into()),
            ..Self::default()
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `QUIZROOM_SERVER_URL`: base WebSocket URL (default: "ws://localhost:8080")
    /// - `QUIZROOM_ROLE`: "admin" | "player" (default: "admin")
    /// - `QUIZROOM_PLAYER_ID`: player id, required when the role is "player"
    /// - `QUIZROOM_OUTBOX_CAPACITY`: commands kept while offline (default: 32)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("QUIZROOM_SERVER_URL").filter(|v| !v.trim().is_empty()) {
            config.server_url = url.trim().to_string();
        }

        if let Some(role) = lookup("QUIZROOM_ROLE") {
            config.role = role.parse().map_err(|reason| ConfigError::Invalid {
                var: "QUIZROOM_ROLE",
                reason,
            })?;
        }

        config.player_id = lookup("QUIZROOM_PLAYER_ID").filter(|v| !v.trim().is_empty());
        if config.role == Role::Player && config.player_id.is_none() {
            return Err(ConfigError::MissingPlayerId("QUIZROOM_PLAYER_ID"));
        }

        if let Some(capacity) = lookup("QUIZROOM_OUTBOX_CAPACITY") {
            config.outbox_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "QUIZROOM_OUTBOX_CAPACITY",
                        reason: "must be at least 1".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "QUIZROOM_OUTBOX_CAPACITY",
                        reason: e.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }

    /// The `JOIN` announced on every (re)connect to `game_id`.
    pub fn join_command(&self, game_id: &str) -> ClientCommand {
        ClientCommand::Join {
            game_id: game_id.to_string(),
            role: self.role,
            player_id: match self.role {
                Role::Player => self.player_id.clone(),
                Role::Admin => None,
            },
        }
    }

    pub fn socket_url(&self, game_id: &str) -> String {
        socket_url(&self.server_url, game_id)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: self.reconnect.clone(),
            heartbeat: self.heartbeat.clone(),
            outbox_capacity: self.outbox_capacity,
        }
    }
}
