use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::RoomError;
use crate::player::Player;
use crate::room::GameKind;
use crate::session::SessionView;

/// Unique identifier for a player within the server process.
pub type PlayerId = u64;

/// Core trait that every Roletrando game engine implements.
///
/// An engine owns only its session data. The room actor owns players, scores
/// and turn order, and turns the events returned here into state changes and
/// broadcasts. Engines never see sockets and never read the clock themselves:
/// `now` is always passed in by the caller.
pub trait GameEngine: Send {
    /// Which game this engine plays.
    fn kind(&self) -> GameKind;

    /// Called once when the host starts the game.
    fn init(&mut self, players: &[Player], now: Instant) -> Vec<GameEvent>;

    /// Which authority check the room must pass before `apply` is called.
    fn gate(&self, intent: &GameIntent) -> IntentGate;

    /// Apply a validated intent from `player_id`.
    fn apply(
        &mut self,
        player_id: PlayerId,
        intent: GameIntent,
        now: Instant,
    ) -> Result<Vec<GameEvent>, RoomError>;

    /// Earliest instant at which `tick` has work to do, if any.
    fn next_deadline(&self) -> Option<Instant>;

    /// Resolve every timer that has expired at `now`.
    fn tick(&mut self, now: Instant) -> Vec<GameEvent>;

    /// Called when a player is evicted from the room for good.
    fn player_left(&mut self, player_id: PlayerId, now: Instant) -> Vec<GameEvent>;

    /// Next action for a server-driven bot, if it has one right now.
    fn bot_intent(&mut self, _bot_id: PlayerId, _holds_turn: bool) -> Option<GameIntent> {
        None
    }

    /// Public projection of the session. Never contains hidden answers.
    fn view(&self, now: Instant) -> SessionView;

    /// Whether the session reached its terminal state.
    fn is_finished(&self) -> bool;
}

/// A game-level intent, i.e. any client message except room lifecycle ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameIntent {
    SpinStart,
    SpinEnd,
    Guess(char),
    Solve(String),
    SubmitAnswer { answer_index: usize },
    NextQuestion,
}

/// Authority required to submit an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentGate {
    /// Only the player holding the turn.
    Turn,
    /// Only the room host.
    Host,
    /// Any player in the room; the engine enforces per-player limits.
    Open,
}

/// Events emitted by an engine. The room actor applies them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A spin outcome was drawn and must be animated by every client.
    SpinDrawn { value: u32 },
    /// Points earned by a player.
    ScoreAwarded { player_id: PlayerId, points: u64 },
    /// A player's total score drops to zero.
    ScoreReset { player_id: PlayerId },
    /// The current turn holder loses the turn.
    TurnEnded,
    /// A quiz question opened for answers.
    QuestionOpened { question_index: usize },
    /// A quiz round closed. Every roster player has an entry (0 if unanswered).
    RoundClosed {
        question_index: usize,
        correct_index: usize,
        round_scores: BTreeMap<PlayerId, u64>,
    },
    /// The session reached its end.
    Finished { winner: Option<PlayerId> },
}
