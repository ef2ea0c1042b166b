//! Shared data models for the live quiz session protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type GameId = String;
pub type QuestionId = String;
pub type PlayerId = String;

// --- Participants ---

/// Who is on the other end of a session connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Player,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Player => f.write_str("player"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "player" => Ok(Role::Player),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    /// Aggregate score as computed by the server. Only meaningful once
    /// winners have been revealed or a snapshot carried it.
    #[serde(default)]
    pub score: i64,
}

impl Player {
    /// Stand-in for a player referenced by an event before the roster
    /// caught up with them.
    pub fn placeholder(id: impl Into<PlayerId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            score: 0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    /// Name to render; falls back to the id for placeholders.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

// --- Questions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl Question {
    pub fn placeholder(id: impl Into<QuestionId>) -> Self {
        Self {
            id: id.into(),
            text: String::new(),
            img: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnswer {
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub text: String,
    /// `None` until the server has graded the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

// --- Session phase ---

/// Display phase of a live session.
///
/// Phases are ordered; under normal flow a session only moves forward.
/// `QuestionActive` is the one phase that may be re-entered (the admin
/// picking another question after revealing answers).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Lobby,
    QuestionActive,
    AnswersShown,
    WinnersShown,
    Ended,
}

impl GamePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Ended)
    }
}
