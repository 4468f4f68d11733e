use serde::{Deserialize, Serialize};

/// A phrase to be guessed in the wheel game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelPhrase {
    pub category: String,
    pub phrase: String,
}

/// A multiple-choice question, answer included. Server-side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub answer: usize,
}

/// A difficulty level of a question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionLevel {
    pub level: u32,
    /// Display label, e.g. "Easy".
    #[serde(default)]
    pub label: String,
    /// Prize label shown next to the level, e.g. "R$ 1.000".
    #[serde(default)]
    pub prize: String,
    pub questions: Vec<Question>,
}

/// A question picked for a session, remembering where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedQuestion {
    pub level: u32,
    pub label: String,
    pub question_index: usize,
    pub question: Question,
}

impl Question {
    /// A question is usable if it has at least two options and the answer
    /// points at one of them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.answer < self.options.len()
    }
}
