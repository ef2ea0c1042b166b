//! Encoding and decoding of session frames.
//!
//! Decoding is strict about shape but lenient about vocabulary: a frame with
//! a `type` outside the known set decodes to [`ServerEvent::Unknown`] so that
//! a newer server never breaks an older client, while a known `type` with a
//! payload that fails validation is rejected as [`DecodeError::Malformed`].

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, EncodeError};
use crate::protocol::{
    kinds, ClientCommand, Envelope, JoinPayload, OptionalQuestionRef, PlayerJoinedPayload,
    QuestionRef, ServerEvent, SessionSnapshot, SubmitAnswerPayload, WinnersPayload,
};

fn to_payload<T: Serialize>(kind: &str, body: &T) -> Result<Value, EncodeError> {
    serde_json::to_value(body).map_err(|source| EncodeError {
        kind: kind.to_string(),
        source,
    })
}

fn to_frame(envelope: &Envelope) -> Result<String, EncodeError> {
    serde_json::to_string(envelope).map_err(|source| EncodeError {
        kind: envelope.kind.clone(),
        source,
    })
}

fn parse_envelope(frame: &str) -> Result<Envelope, DecodeError> {
    serde_json::from_str::<Envelope>(frame).map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|e| DecodeError::malformed(kind, e))
}

/// Like [`payload_as`] but accepts a `null` payload for bodies whose fields
/// are all optional.
fn optional_payload_as<T: DeserializeOwned + Default>(
    kind: &str,
    payload: Value,
) -> Result<T, DecodeError> {
    if payload.is_null() {
        Ok(T::default())
    } else {
        payload_as(kind, payload)
    }
}

// --- Commands ---

/// Wrap a command in its wire envelope.
pub fn command_envelope(command: &ClientCommand) -> Result<Envelope, EncodeError> {
    let kind = command.kind();
    let payload = match command {
        ClientCommand::Join {
            game_id,
            role,
            player_id,
        } => to_payload(
            kind,
            &JoinPayload {
                game_id: game_id.clone(),
                role: *role,
                player_id: player_id.clone(),
            },
        )?,
        ClientCommand::ChangeQuestion { question_id } => to_payload(
            kind,
            &QuestionRef {
                question_id: question_id.clone(),
            },
        )?,
        ClientCommand::ShowAnswers { question_id } => to_payload(
            kind,
            &OptionalQuestionRef {
                question_id: question_id.clone(),
            },
        )?,
        ClientCommand::ShowWinners | ClientCommand::EndGame => Value::Null,
        ClientCommand::SubmitAnswer { question_id, text } => to_payload(
            kind,
            &SubmitAnswerPayload {
                question_id: question_id.clone(),
                text: text.clone(),
            },
        )?,
    };
    Ok(Envelope::new(kind, payload))
}

/// Serialize a command into a text frame.
pub fn encode_command(command: &ClientCommand) -> Result<String, EncodeError> {
    to_frame(&command_envelope(command)?)
}

/// Parse a text frame sent by a client. Used by servers and test peers.
pub fn decode_command(frame: &str) -> Result<ClientCommand, DecodeError> {
    let Envelope { kind, payload } = parse_envelope(frame)?;
    let command = match kind.as_str() {
        kinds::JOIN => {
            let JoinPayload {
                game_id,
                role,
                player_id,
            } = payload_as(&kind, payload)?;
            ClientCommand::Join {
                game_id,
                role,
                player_id,
            }
        }
        kinds::CHANGE_QUESTION => {
            let QuestionRef { question_id } = payload_as(&kind, payload)?;
            ClientCommand::ChangeQuestion { question_id }
        }
        kinds::SHOW_ANSWERS => {
            let OptionalQuestionRef { question_id } = optional_payload_as(&kind, payload)?;
            ClientCommand::ShowAnswers { question_id }
        }
        kinds::SHOW_WINNERS => ClientCommand::ShowWinners,
        kinds::END_GAME => ClientCommand::EndGame,
        kinds::SUBMIT_ANSWER => {
            let SubmitAnswerPayload { question_id, text } = payload_as(&kind, payload)?;
            ClientCommand::SubmitAnswer { question_id, text }
        }
        _ => return Err(DecodeError::UnsupportedCommand(kind)),
    };
    Ok(command)
}

// --- Events ---

/// Check the invariants a snapshot must satisfy before it may replace a
/// client's projection.
fn validate_snapshot(snapshot: &SessionSnapshot) -> Result<(), String> {
    if let Some(active) = &snapshot.active_question_id {
        if !snapshot.all_questions.iter().any(|q| &q.id == active) {
            return Err(format!(
                "activeQuestionId '{}' is not in allQuestions",
                active
            ));
        }
    }
    Ok(())
}

/// Parse a text frame sent by the server.
pub fn decode_event(frame: &str) -> Result<ServerEvent, DecodeError> {
    let Envelope { kind, payload } = parse_envelope(frame)?;
    let event = match kind.as_str() {
        kinds::STATE_SNAPSHOT => {
            let snapshot: SessionSnapshot = payload_as(&kind, payload)?;
            validate_snapshot(&snapshot).map_err(|reason| DecodeError::malformed(&kind, reason))?;
            ServerEvent::StateSnapshot(snapshot)
        }
        kinds::QUESTION_CHANGED => {
            let QuestionRef { question_id } = payload_as(&kind, payload)?;
            ServerEvent::QuestionChanged { question_id }
        }
        kinds::ANSWERS_SHOWN => {
            let OptionalQuestionRef { question_id } = optional_payload_as(&kind, payload)?;
            ServerEvent::AnswersShown { question_id }
        }
        kinds::PLAYER_JOINED => {
            let PlayerJoinedPayload { player } = payload_as(&kind, payload)?;
            ServerEvent::PlayerJoined { player }
        }
        kinds::ANSWER_RECEIVED => ServerEvent::AnswerReceived(payload_as(&kind, payload)?),
        kinds::WINNERS_SHOWN => {
            let WinnersPayload { scores } = payload_as(&kind, payload)?;
            ServerEvent::WinnersShown { scores }
        }
        kinds::GAME_ENDED => ServerEvent::GameEnded,
        _ => ServerEvent::Unknown { kind },
    };
    Ok(event)
}

/// Serialize an event into a text frame. Used by servers and test peers.
pub fn encode_event(event: &ServerEvent) -> Result<String, EncodeError> {
    let kind = event.kind();
    let payload = match event {
        ServerEvent::StateSnapshot(snapshot) => to_payload(kind, snapshot)?,
        ServerEvent::QuestionChanged { question_id } => to_payload(
            kind,
            &QuestionRef {
                question_id: question_id.clone(),
            },
        )?,
        ServerEvent::AnswersShown { question_id } => to_payload(
            kind,
            &OptionalQuestionRef {
                question_id: question_id.clone(),
            },
        )?,
        ServerEvent::PlayerJoined { player } => to_payload(
            kind,
            &PlayerJoinedPayload {
                player: player.clone(),
            },
        )?,
        ServerEvent::AnswerReceived(answer) => to_payload(kind, answer)?,
        ServerEvent::WinnersShown { scores } => to_payload(
            kind,
            &WinnersPayload {
                scores: scores.clone(),
            },
        )?,
        ServerEvent::GameEnded | ServerEvent::Unknown { .. } => Value::Null,
    };
    to_frame(&Envelope::new(kind, payload))
}
