use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, RoomError};
use crate::game_trait::{GameIntent, PlayerId};
use crate::room::RoomSnapshot;
use crate::session::RoundScore;

/// Network message type discriminator, the `type` field of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Client -> Server
    StartGame,
    AddBot,
    SpinStart,
    SpinEnd,
    Guess,
    Solve,
    SubmitScore,
    NextQuestion,

    // Server -> Client
    StateUpdate,
    GameStart,
    RoundReveal,
    GameOver,
    Welcome,
    Error,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartGame => "START_GAME",
            Self::AddBot => "ADD_BOT",
            Self::SpinStart => "SPIN_START",
            Self::SpinEnd => "SPIN_END",
            Self::Guess => "GUESS",
            Self::Solve => "SOLVE",
            Self::SubmitScore => "SUBMIT_SCORE",
            Self::NextQuestion => "NEXT_QUESTION",
            Self::StateUpdate => "STATE_UPDATE",
            Self::GameStart => "GAME_START",
            Self::RoundReveal => "ROUND_REVEAL",
            Self::GameOver => "GAME_OVER",
            Self::Welcome => "WELCOME",
            Self::Error => "ERROR",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "START_GAME" => Self::StartGame,
            "ADD_BOT" => Self::AddBot,
            "SPIN_START" => Self::SpinStart,
            "SPIN_END" => Self::SpinEnd,
            "GUESS" => Self::Guess,
            "SOLVE" => Self::Solve,
            "SUBMIT_SCORE" => Self::SubmitScore,
            "NEXT_QUESTION" => Self::NextQuestion,
            "STATE_UPDATE" => Self::StateUpdate,
            "GAME_START" => Self::GameStart,
            "ROUND_REVEAL" => Self::RoundReveal,
            "GAME_OVER" => Self::GameOver,
            "WELCOME" => Self::Welcome,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }

    /// Whether clients are allowed to send this type.
    pub const fn is_intent(self) -> bool {
        matches!(
            self,
            Self::StartGame
                | Self::AddBot
                | Self::SpinStart
                | Self::SpinEnd
                | Self::Guess
                | Self::Solve
                | Self::SubmitScore
                | Self::NextQuestion
        )
    }
}

/// Messages sent from a client to the room authority.
///
/// Decoding goes through `protocol::decode_client_message`, which validates
/// every payload shape; the derived `Serialize` is what clients put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    StartGame,
    AddBot,
    SpinStart,
    SpinEnd,
    Guess(char),
    Solve(String),
    SubmitScore(SubmitScoreMsg),
    NextQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreMsg {
    pub answer_index: usize,
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::StartGame => MessageType::StartGame,
            Self::AddBot => MessageType::AddBot,
            Self::SpinStart => MessageType::SpinStart,
            Self::SpinEnd => MessageType::SpinEnd,
            Self::Guess(_) => MessageType::Guess,
            Self::Solve(_) => MessageType::Solve,
            Self::SubmitScore(_) => MessageType::SubmitScore,
            Self::NextQuestion => MessageType::NextQuestion,
        }
    }

    /// The game-level intent, or `None` for room lifecycle messages.
    pub fn into_game_intent(self) -> Option<GameIntent> {
        match self {
            Self::StartGame | Self::AddBot => None,
            Self::SpinStart => Some(GameIntent::SpinStart),
            Self::SpinEnd => Some(GameIntent::SpinEnd),
            Self::Guess(letter) => Some(GameIntent::Guess(letter)),
            Self::Solve(phrase) => Some(GameIntent::Solve(phrase)),
            Self::SubmitScore(m) => Some(GameIntent::SubmitAnswer {
                answer_index: m.answer_index,
            }),
            Self::NextQuestion => Some(GameIntent::NextQuestion),
        }
    }
}

/// Messages sent from the room authority to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    StateUpdate(StateUpdateMsg),
    /// The predetermined spin outcome every client animates toward.
    SpinStart(u32),
    GameStart,
    RoundReveal(RoundRevealMsg),
    GameOver(GameOverMsg),
    Welcome(WelcomeMsg),
    Error(ErrorMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::StateUpdate(_) => MessageType::StateUpdate,
            Self::SpinStart(_) => MessageType::SpinStart,
            Self::GameStart => MessageType::GameStart,
            Self::RoundReveal(_) => MessageType::RoundReveal,
            Self::GameOver(_) => MessageType::GameOver,
            Self::Welcome(_) => MessageType::Welcome,
            Self::Error(_) => MessageType::Error,
        }
    }

    pub fn error(err: &RoomError) -> Self {
        Self::Error(ErrorMsg {
            code: err.code(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdateMsg {
    /// Per-room broadcast sequence number, strictly increasing.
    pub seq: u64,
    pub room: RoomSnapshot,
    pub current_player_turn_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRevealMsg {
    pub question_index: usize,
    pub correct_index: usize,
    pub round_scores: Vec<RoundScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverMsg {
    pub winner_id: Option<PlayerId>,
    pub final_scores: Vec<FinalScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub player_id: PlayerId,
    pub room_id: String,
    pub reconnected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMsg {
    pub code: ErrorCode,
    pub message: String,
}
