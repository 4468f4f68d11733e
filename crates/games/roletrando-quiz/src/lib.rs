pub mod scoring;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use roletrando_core::content::{QuestionLevel, SelectedQuestion};
use roletrando_core::error::RoomError;
use roletrando_core::game_trait::{GameEngine, GameEvent, GameIntent, IntentGate, PlayerId};
use roletrando_core::player::Player;
use roletrando_core::room::GameKind;
use roletrando_core::session::{QuestionView, QuizPhase, QuizView, RoundScore, SessionView};

use scoring::speed_points;

/// Default answer window per question.
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub round_duration: Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            round_duration: DEFAULT_ROUND_DURATION,
        }
    }
}

struct QuizSession {
    questions: Vec<SelectedQuestion>,
    index: usize,
    phase: QuizPhase,
    deadline: Option<Instant>,
    /// Players taking part, in join order.
    roster: Vec<PlayerId>,
    answers: BTreeMap<PlayerId, usize>,
    /// Points earned in the current question, one entry per answer.
    round_scores: BTreeMap<PlayerId, u64>,
    totals: BTreeMap<PlayerId, u64>,
}

impl QuizSession {
    fn current(&self) -> Option<&SelectedQuestion> {
        self.questions.get(self.index)
    }

    fn open_question(&mut self, now: Instant, round: Duration) -> Vec<GameEvent> {
        self.phase = QuizPhase::Question;
        self.deadline = Some(now + round);
        self.answers.clear();
        self.round_scores.clear();
        vec![GameEvent::QuestionOpened {
            question_index: self.index,
        }]
    }

    fn all_answered(&self) -> bool {
        !self.roster.is_empty() && self.roster.iter().all(|id| self.answers.contains_key(id))
    }

    fn close_round(&mut self) -> Vec<GameEvent> {
        self.phase = QuizPhase::Reveal;
        self.deadline = None;

        let mut events = Vec::with_capacity(self.roster.len() + 1);
        let mut round_scores = BTreeMap::new();
        for &player_id in &self.roster {
            let points = self.round_scores.get(&player_id).copied().unwrap_or(0);
            self.round_scores.insert(player_id, points);
            round_scores.insert(player_id, points);
            if points > 0 {
                *self.totals.entry(player_id).or_insert(0) += points;
                events.push(GameEvent::ScoreAwarded { player_id, points });
            }
        }
        let correct_index = self.current().map_or(0, |q| q.question.answer);
        events.push(GameEvent::RoundClosed {
            question_index: self.index,
            correct_index,
            round_scores,
        });
        events
    }

    fn end(&mut self) -> Vec<GameEvent> {
        self.phase = QuizPhase::Ended;
        self.deadline = None;
        vec![GameEvent::Finished {
            winner: self.leader(),
        }]
    }

    /// Highest total, earliest roster position on ties. Nobody wins on zero.
    fn leader(&self) -> Option<PlayerId> {
        let mut best: Option<(PlayerId, u64)> = None;
        for &player_id in &self.roster {
            let total = self.totals.get(&player_id).copied().unwrap_or(0);
            if total > 0 && best.is_none_or(|(_, top)| total > top) {
                best = Some((player_id, total));
            }
        }
        best.map(|(id, _)| id)
    }

    fn submit(
        &mut self,
        player_id: PlayerId,
        answer_index: usize,
        now: Instant,
        round: Duration,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let deadline = match (self.phase, self.deadline) {
            (QuizPhase::Question, Some(deadline)) if now < deadline => deadline,
            _ => return Err(RoomError::invalid("the answer window is closed")),
        };
        if !self.roster.contains(&player_id) {
            return Err(RoomError::invalid("you are not playing this round"));
        }
        if self.answers.contains_key(&player_id) {
            return Err(RoomError::AlreadyAnswered);
        }
        let Some(current) = self.current() else {
            return Err(RoomError::invalid("no open question"));
        };
        if answer_index >= current.question.options.len() {
            return Err(RoomError::invalid("answer index out of range"));
        }

        let points = if answer_index == current.question.answer {
            speed_points(deadline.saturating_duration_since(now), round)
        } else {
            0
        };
        self.answers.insert(player_id, answer_index);
        self.round_scores.insert(player_id, points);
        tracing::debug!(player_id, answer_index, points, "Quiz answer recorded");

        if self.all_answered() {
            return Ok(self.close_round());
        }
        Ok(Vec::new())
    }

    fn view(&self, now: Instant) -> QuizView {
        let revealed = matches!(self.phase, QuizPhase::Reveal | QuizPhase::Ended);
        let question = match self.phase {
            QuizPhase::Ended => None,
            _ => self.current().map(|q| QuestionView {
                label: q.label.clone(),
                question: q.question.question.clone(),
                options: q.question.options.clone(),
            }),
        };
        QuizView {
            question_index: self.index,
            total_questions: self.questions.len(),
            phase: self.phase,
            question,
            remaining_ms: match (self.phase, self.deadline) {
                (QuizPhase::Question, Some(deadline)) => {
                    deadline.saturating_duration_since(now).as_millis() as u64
                },
                _ => 0,
            },
            answered: self
                .roster
                .iter()
                .copied()
                .filter(|id| self.answers.contains_key(id))
                .collect(),
            round_scores: if revealed {
                self.roster
                    .iter()
                    .filter_map(|&player_id| {
                        self.round_scores
                            .get(&player_id)
                            .map(|&points| RoundScore { player_id, points })
                    })
                    .collect()
            } else {
                Vec::new()
            },
            correct_index: if revealed {
                self.current().map(|q| q.question.answer)
            } else {
                None
            },
        }
    }
}

/// The timed multiplayer quiz engine.
///
/// Every player answers the same question at once. Points depend only on
/// the server clock at receipt and are credited when the round closes.
pub struct QuizGame {
    levels: Vec<QuestionLevel>,
    config: QuizConfig,
    rng: StdRng,
    session: Option<QuizSession>,
}

impl QuizGame {
    pub fn new(levels: Vec<QuestionLevel>, config: QuizConfig) -> Self {
        Self::with_rng(levels, config, StdRng::from_os_rng())
    }

    pub fn with_seed(levels: Vec<QuestionLevel>, config: QuizConfig, seed: u64) -> Self {
        Self::with_rng(levels, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(levels: Vec<QuestionLevel>, config: QuizConfig, rng: StdRng) -> Self {
        Self {
            levels,
            config,
            rng,
            session: None,
        }
    }

    pub fn phase(&self) -> Option<QuizPhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// One random well-formed question per level, in level order.
    fn select_questions(&mut self) -> Vec<SelectedQuestion> {
        let mut levels: Vec<&QuestionLevel> = self.levels.iter().collect();
        levels.sort_by_key(|l| l.level);

        let mut selected = Vec::with_capacity(levels.len());
        for level in levels {
            let usable: Vec<usize> = level
                .questions
                .iter()
                .enumerate()
                .filter(|(_, q)| q.is_well_formed())
                .map(|(i, _)| i)
                .collect();
            if usable.is_empty() {
                continue;
            }
            let question_index = usable[self.rng.random_range(0..usable.len())];
            selected.push(SelectedQuestion {
                level: level.level,
                label: level.label.clone(),
                question_index,
                question: level.questions[question_index].clone(),
            });
        }
        selected
    }
}

impl GameEngine for QuizGame {
    fn kind(&self) -> GameKind {
        GameKind::Quiz
    }

    fn init(&mut self, players: &[Player], now: Instant) -> Vec<GameEvent> {
        let questions = self.select_questions();
        tracing::debug!(
            questions = questions.len(),
            players = players.len(),
            "Quiz session started"
        );
        let mut session = QuizSession {
            questions,
            index: 0,
            phase: QuizPhase::Question,
            deadline: None,
            roster: players.iter().map(|p| p.id).collect(),
            answers: BTreeMap::new(),
            round_scores: BTreeMap::new(),
            totals: BTreeMap::new(),
        };
        let events = if session.questions.is_empty() {
            tracing::warn!("Quiz started without any usable question");
            session.end()
        } else {
            session.open_question(now, self.config.round_duration)
        };
        self.session = Some(session);
        events
    }

    fn gate(&self, intent: &GameIntent) -> IntentGate {
        match intent {
            GameIntent::NextQuestion => IntentGate::Host,
            _ => IntentGate::Open,
        }
    }

    fn apply(
        &mut self,
        player_id: PlayerId,
        intent: GameIntent,
        now: Instant,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let round = self.config.round_duration;
        let Some(session) = self.session.as_mut() else {
            return Err(RoomError::invalid("no quiz in progress"));
        };

        match intent {
            GameIntent::SubmitAnswer { answer_index } => {
                session.submit(player_id, answer_index, now, round)
            },
            GameIntent::NextQuestion => {
                if session.phase != QuizPhase::Reveal {
                    return Err(RoomError::invalid("the current question is not revealed yet"));
                }
                session.index += 1;
                if session.index >= session.questions.len() {
                    // Keep the last question's reveal data on screen.
                    session.index = session.questions.len().saturating_sub(1);
                    return Ok(session.end());
                }
                Ok(session.open_question(now, round))
            },
            GameIntent::SpinStart
            | GameIntent::SpinEnd
            | GameIntent::Guess(_)
            | GameIntent::Solve(_) => Err(RoomError::invalid("not a quiz intent")),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .filter(|s| s.phase == QuizPhase::Question)
            .and_then(|s| s.deadline)
    }

    fn tick(&mut self, now: Instant) -> Vec<GameEvent> {
        match self.session.as_mut() {
            Some(session)
                if session.phase == QuizPhase::Question
                    && session.deadline.is_some_and(|d| d <= now) =>
            {
                tracing::debug!(
                    question = session.index,
                    answered = session.answers.len(),
                    roster = session.roster.len(),
                    "Quiz round timed out"
                );
                session.close_round()
            },
            _ => Vec::new(),
        }
    }

    fn player_left(&mut self, player_id: PlayerId, _now: Instant) -> Vec<GameEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.roster.retain(|&id| id != player_id);
        session.answers.remove(&player_id);
        session.round_scores.remove(&player_id);
        if session.phase == QuizPhase::Question && session.all_answered() {
            return session.close_round();
        }
        Vec::new()
    }

    fn bot_intent(&mut self, bot_id: PlayerId, _holds_turn: bool) -> Option<GameIntent> {
        let session = self.session.as_ref()?;
        if session.phase != QuizPhase::Question
            || !session.roster.contains(&bot_id)
            || session.answers.contains_key(&bot_id)
        {
            return None;
        }
        let options = session.current()?.question.options.len();
        Some(GameIntent::SubmitAnswer {
            answer_index: self.rng.random_range(0..options),
        })
    }

    fn view(&self, now: Instant) -> SessionView {
        let view = match &self.session {
            Some(session) => session.view(now),
            None => QuizView {
                question_index: 0,
                total_questions: 0,
                phase: QuizPhase::Question,
                question: None,
                remaining_ms: 0,
                answered: Vec::new(),
                round_scores: Vec::new(),
                correct_index: None,
            },
        };
        SessionView::Quiz(view)
    }

    fn is_finished(&self) -> bool {
        self.phase() == Some(QuizPhase::Ended)
    }
}
