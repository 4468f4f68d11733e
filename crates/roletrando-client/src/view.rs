use roletrando_core::game_trait::PlayerId;
use roletrando_core::net::messages::{ErrorMsg, GameOverMsg, RoundRevealMsg, ServerMessage};
use roletrando_core::player::Player;
use roletrando_core::room::{RoomSnapshot, RoomStatus};
use roletrando_core::session::WheelPhase;

/// Room state as one client sees it, rebuilt only from server messages.
///
/// Nothing here is ever decided locally: spin values, scores and turn
/// ownership all come from the room authority.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    player_id: Option<PlayerId>,
    room_id: Option<String>,
    last_seq: Option<u64>,
    room: Option<RoomSnapshot>,
    current_turn: Option<PlayerId>,
    spin_in_flight: Option<u32>,
    last_reveal: Option<RoundRevealMsg>,
    game_over: Option<GameOverMsg>,
    last_error: Option<ErrorMsg>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one server message into the view. Returns false when the message
    /// was ignored, which only happens for an out-of-date `STATE_UPDATE`.
    pub fn apply(&mut self, msg: &ServerMessage) -> bool {
        match msg {
            ServerMessage::Welcome(welcome) => {
                let same_room = self.room_id.as_deref() == Some(welcome.room_id.as_str());
                if !(welcome.reconnected && same_room) {
                    *self = Self::default();
                }
                self.player_id = Some(welcome.player_id);
                self.room_id = Some(welcome.room_id.clone());
            },
            ServerMessage::StateUpdate(update) => {
                if self.last_seq.is_some_and(|last| update.seq <= last) {
                    tracing::debug!(
                        seq = update.seq,
                        last = ?self.last_seq,
                        "Ignoring stale state update"
                    );
                    return false;
                }
                self.last_seq = Some(update.seq);
                self.current_turn = update.current_player_turn_id;
                let spinning = update.room.status == RoomStatus::Playing
                    && update
                        .room
                        .game_session
                        .as_ref()
                        .is_some_and(|s| s.phase == WheelPhase::SpinPending);
                if !spinning {
                    self.spin_in_flight = None;
                }
                self.room = Some(update.room.clone());
            },
            ServerMessage::SpinStart(value) => self.spin_in_flight = Some(*value),
            ServerMessage::GameStart => {
                self.spin_in_flight = None;
                self.last_reveal = None;
                self.game_over = None;
            },
            ServerMessage::RoundReveal(reveal) => self.last_reveal = Some(reveal.clone()),
            ServerMessage::GameOver(over) => self.game_over = Some(over.clone()),
            ServerMessage::Error(err) => self.last_error = Some(err.clone()),
        }
        true
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.room.as_ref()
    }

    /// This client's own player entry, once a snapshot arrived.
    pub fn me(&self) -> Option<&Player> {
        let id = self.player_id?;
        self.room.as_ref()?.players.iter().find(|p| p.id == id)
    }

    pub fn is_host(&self) -> bool {
        self.player_id
            .is_some_and(|id| self.room.as_ref().and_then(|r| r.host_id) == Some(id))
    }

    pub fn is_my_turn(&self) -> bool {
        self.player_id.is_some() && self.current_turn == self.player_id
    }

    /// The value announced by the last `SPIN_START` that has not been
    /// revealed yet.
    pub fn spin_in_flight(&self) -> Option<u32> {
        self.spin_in_flight
    }

    pub fn last_reveal(&self) -> Option<&RoundRevealMsg> {
        self.last_reveal.as_ref()
    }

    pub fn game_over(&self) -> Option<&GameOverMsg> {
        self.game_over.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorMsg> {
        self.last_error.as_ref()
    }
}
