use serde::{Deserialize, Serialize};

use crate::game_trait::PlayerId;

/// Public projection of the active game session, as returned by an engine.
/// The room snapshot carries it as `gameSession` or `quizSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionView {
    Wheel(WheelView),
    Quiz(QuizView),
}

/// Where a wheel turn currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WheelPhase {
    AwaitingSpin,
    /// A value was drawn and is being animated; waiting for `SPIN_END`.
    SpinPending,
    AwaitingGuess,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelView {
    pub category: String,
    pub obscured_phrase: String,
    pub guessed_letters: Vec<char>,
    pub current_spin_value: u32,
    pub pending_spin_value: u32,
    pub phase: WheelPhase,
    pub game_over: bool,
    pub message: String,
    /// Revealed only once the game is over.
    pub phrase: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizPhase {
    Question,
    Reveal,
    Ended,
}

/// A question as shown to players. The answer is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub label: String,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub question_index: usize,
    pub total_questions: usize,
    pub phase: QuizPhase,
    pub question: Option<QuestionView>,
    /// Milliseconds left in the answer window, 0 outside of it.
    pub remaining_ms: u64,
    /// Players who already answered the current question.
    pub answered: Vec<PlayerId>,
    /// Only filled once the round is revealed.
    pub round_scores: Vec<RoundScore>,
    /// Only filled once the round is revealed.
    pub correct_index: Option<usize>,
}

/// Points a player earned in one quiz round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub player_id: PlayerId,
    pub points: u64,
}
