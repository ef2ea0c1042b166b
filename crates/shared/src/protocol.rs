//! Live session protocol: the `{type, payload}` envelope and the closed sets
//! of client commands and server events carried inside it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{GameId, GamePhase, Player, PlayerAnswer, PlayerId, Question, QuestionId, Role};

/// Wire envelope wrapping every frame in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// `null` for messages without a body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Envelope `type` tags.
pub mod kinds {
    // Client -> server
    pub const JOIN: &str = "JOIN";
    pub const CHANGE_QUESTION: &str = "CHANGE_QUESTION";
    pub const SHOW_ANSWERS: &str = "SHOW_ANSWERS";
    pub const SHOW_WINNERS: &str = "SHOW_WINNERS";
    pub const END_GAME: &str = "END_GAME";
    pub const SUBMIT_ANSWER: &str = "SUBMIT_ANSWER";

    // Server -> client
    pub const STATE_SNAPSHOT: &str = "STATE_SNAPSHOT";
    pub const QUESTION_CHANGED: &str = "QUESTION_CHANGED";
    pub const ANSWERS_SHOWN: &str = "ANSWERS_SHOWN";
    pub const PLAYER_JOINED: &str = "PLAYER_JOINED";
    pub const ANSWER_RECEIVED: &str = "ANSWER_RECEIVED";
    pub const WINNERS_SHOWN: &str = "WINNERS_SHOWN";
    pub const GAME_ENDED: &str = "GAME_ENDED";
}

// --- Client commands ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Announce presence; sent on every (re)connect so the server replies
    /// with a fresh snapshot.
    Join {
        game_id: GameId,
        role: Role,
        player_id: Option<PlayerId>,
    },
    ChangeQuestion {
        question_id: QuestionId,
    },
    ShowAnswers {
        question_id: Option<QuestionId>,
    },
    ShowWinners,
    EndGame,
    SubmitAnswer {
        question_id: QuestionId,
        text: String,
    },
}

impl ClientCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Join { .. } => kinds::JOIN,
            ClientCommand::ChangeQuestion { .. } => kinds::CHANGE_QUESTION,
            ClientCommand::ShowAnswers { .. } => kinds::SHOW_ANSWERS,
            ClientCommand::ShowWinners => kinds::SHOW_WINNERS,
            ClientCommand::EndGame => kinds::END_GAME,
            ClientCommand::SubmitAnswer { .. } => kinds::SUBMIT_ANSWER,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, ClientCommand::Join { .. })
    }
}

// --- Server events ---

/// Full session state, sent by the server after every `JOIN`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub all_questions: Vec<Question>,
    #[serde(default)]
    pub active_question_id: Option<QuestionId>,
    #[serde(default)]
    pub player_answers: Vec<PlayerAnswer>,
    pub phase: GamePhase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    StateSnapshot(SessionSnapshot),
    QuestionChanged {
        question_id: QuestionId,
    },
    AnswersShown {
        question_id: Option<QuestionId>,
    },
    PlayerJoined {
        player: Player,
    },
    AnswerReceived(PlayerAnswer),
    /// Aggregate scores computed by the server.
    WinnersShown {
        scores: BTreeMap<PlayerId, i64>,
    },
    GameEnded,
    /// A `type` this client does not know. Folded as a no-op.
    Unknown {
        kind: String,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::StateSnapshot(_) => kinds::STATE_SNAPSHOT,
            ServerEvent::QuestionChanged { .. } => kinds::QUESTION_CHANGED,
            ServerEvent::AnswersShown { .. } => kinds::ANSWERS_SHOWN,
            ServerEvent::PlayerJoined { .. } => kinds::PLAYER_JOINED,
            ServerEvent::AnswerReceived(_) => kinds::ANSWER_RECEIVED,
            ServerEvent::WinnersShown { .. } => kinds::WINNERS_SHOWN,
            ServerEvent::GameEnded => kinds::GAME_ENDED,
            ServerEvent::Unknown { kind } => kind,
        }
    }
}

// --- Payload bodies (wire shapes) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinPayload {
    pub game_id: GameId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionRef {
    pub question_id: QuestionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OptionalQuestionRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<QuestionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitAnswerPayload {
    pub question_id: QuestionId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerJoinedPayload {
    pub player: Player,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WinnersPayload {
    pub scores: BTreeMap<PlayerId, i64>,
}
