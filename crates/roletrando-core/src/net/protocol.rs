use serde::Deserialize;

use crate::error::RoomError;

use super::messages::{ClientMessage, MessageType, ServerMessage, SubmitScoreMsg};

/// Maximum accepted inbound frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

/// Longest accepted `SOLVE` attempt, in characters.
pub const MAX_SOLVE_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    EmptyMessage,
    #[error("payload too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    PayloadTooLarge(usize),
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("invalid {msg_type} payload: {reason}")]
    InvalidPayload {
        msg_type: &'static str,
        reason: String,
    },
    #[error("serialize error: {0}")]
    SerializeError(String),
}

impl From<ProtocolError> for RoomError {
    fn from(err: ProtocolError) -> Self {
        RoomError::invalid(err.to_string())
    }
}

/// The `{type, payload}` envelope as it arrives, before the payload is
/// checked against the type.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Encode a `ServerMessage` to a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ClientMessage` to a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a JSON text frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Decode and validate a client frame.
///
/// Payloads of payload-less intents are ignored, so a client echoing a value
/// in `SPIN_END` cannot influence anything.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let msg_type = MessageType::from_str_opt(&envelope.msg_type)
        .filter(|t| t.is_intent())
        .ok_or_else(|| ProtocolError::UnknownMessageType(envelope.msg_type.clone()))?;

    match msg_type {
        MessageType::StartGame => Ok(ClientMessage::StartGame),
        MessageType::AddBot => Ok(ClientMessage::AddBot),
        MessageType::SpinStart => Ok(ClientMessage::SpinStart),
        MessageType::SpinEnd => Ok(ClientMessage::SpinEnd),
        MessageType::NextQuestion => Ok(ClientMessage::NextQuestion),
        MessageType::Guess => decode_guess(&envelope.payload).map(ClientMessage::Guess),
        MessageType::Solve => decode_solve(&envelope.payload).map(ClientMessage::Solve),
        MessageType::SubmitScore => serde_json::from_value::<SubmitScoreMsg>(envelope.payload)
            .map(ClientMessage::SubmitScore)
            .map_err(|e| invalid(MessageType::SubmitScore, e.to_string())),
        _ => Err(ProtocolError::UnknownMessageType(envelope.msg_type)),
    }
}

fn invalid(msg_type: MessageType, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidPayload {
        msg_type: msg_type.as_str(),
        reason: reason.into(),
    }
}

/// A guess is exactly one alphabetic character, normalized to upper case.
fn decode_guess(payload: &serde_json::Value) -> Result<char, ProtocolError> {
    let Some(raw) = payload.as_str() else {
        return Err(invalid(MessageType::Guess, "expected a string"));
    };
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_alphabetic() => {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => Ok(u),
                _ => Err(invalid(MessageType::Guess, "letter has no single upper-case form")),
            }
        },
        _ => Err(invalid(MessageType::Guess, "expected a single letter")),
    }
}

fn decode_solve(payload: &serde_json::Value) -> Result<String, ProtocolError> {
    let Some(raw) = payload.as_str() else {
        return Err(invalid(MessageType::Solve, "expected a string"));
    };
    let attempt = raw.trim();
    if attempt.is_empty() {
        return Err(invalid(MessageType::Solve, "empty attempt"));
    }
    if attempt.chars().count() > MAX_SOLVE_LEN {
        return Err(invalid(MessageType::Solve, "attempt too long"));
    }
    Ok(attempt.to_string())
}
