use serde::{Deserialize, Serialize};

/// Wire-level error code carried by `ERROR` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    NameTaken,
    RoomAlreadyExists,
    NotHost,
    AlreadyStarted,
    NotYourTurn,
    AlreadyAnswered,
    InvalidIntent,
    SessionExpired,
    ConnectionLost,
}

/// Rejections produced by the room authority.
///
/// None of these mutate room state; they are reported to the offending
/// connection only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("name is already taken in this room")]
    NameTaken,
    #[error("a room with this code is already active")]
    RoomAlreadyExists,
    #[error("only the host can do that")]
    NotHost,
    #[error("game already in progress")]
    AlreadyStarted,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("you already answered this question")]
    AlreadyAnswered,
    #[error("invalid intent: {0}")]
    InvalidIntent(String),
    #[error("room session expired")]
    SessionExpired,
    #[error("connection lost")]
    ConnectionLost,
}

impl RoomError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidIntent(reason.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::NameTaken => ErrorCode::NameTaken,
            Self::RoomAlreadyExists => ErrorCode::RoomAlreadyExists,
            Self::NotHost => ErrorCode::NotHost,
            Self::AlreadyStarted => ErrorCode::AlreadyStarted,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::AlreadyAnswered => ErrorCode::AlreadyAnswered,
            Self::InvalidIntent(_) => ErrorCode::InvalidIntent,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::ConnectionLost => ErrorCode::ConnectionLost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&RoomError::NotYourTurn.code()).unwrap();
        assert_eq!(json, "\"NOT_YOUR_TURN\"");
        let json = serde_json::to_string(&RoomError::invalid("x").code()).unwrap();
        assert_eq!(json, "\"INVALID_INTENT\"");
    }

    #[test]
    fn invalid_intent_message_includes_reason() {
        assert_eq!(
            RoomError::invalid("spin first").to_string(),
            "invalid intent: spin first"
        );
    }
}
