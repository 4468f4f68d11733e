use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game_trait::PlayerId;
use crate::player::Player;
use crate::session::{QuizView, WheelView};

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 4;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Which game a room plays. Also the first path segment of the WebSocket URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// Wheel-Spin-and-Guess.
    Game,
    /// Timed multiplayer quiz.
    Quiz,
}

impl GameKind {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "game" => Some(Self::Game),
            "quiz" => Some(Self::Quiz),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Quiz => "quiz",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Full authoritative room snapshot carried by `STATE_UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    pub game_kind: GameKind,
    pub theme: String,
    pub status: RoomStatus,
    pub players: Vec<Player>,
    pub current_turn_index: usize,
    pub host_id: Option<PlayerId>,
    pub game_session: Option<WheelView>,
    pub quiz_session: Option<QuizView>,
}

/// Generate a random room code like `K7QD`. Ambiguous glyphs (0/O, 1/I) are
/// left out so codes can be read aloud and typed back.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Upper-case and validate a room code typed by a user.
///
/// Any ASCII alphanumeric code of the right length is accepted, not only the
/// ones `generate_room_code` would produce.
pub fn normalize_room_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if is_valid_room_code(&code) {
        Some(code)
    } else {
        None
    }
}

/// Check that a code is exactly `ROOM_CODE_LEN` upper-case ASCII alphanumerics.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
