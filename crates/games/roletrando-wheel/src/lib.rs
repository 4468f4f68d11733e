pub mod bot;
pub mod phrase;
pub mod segments;

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use roletrando_core::content::WheelPhrase;
use roletrando_core::error::RoomError;
use roletrando_core::game_trait::{GameEngine, GameEvent, GameIntent, IntentGate, PlayerId};
use roletrando_core::player::Player;
use roletrando_core::room::GameKind;
use roletrando_core::session::{SessionView, WheelPhase, WheelView};

use bot::BotMove;

/// How long the server waits for the spinner's `SPIN_END` before revealing.
pub const DEFAULT_SPIN_REVEAL_TIMEOUT: Duration = Duration::from_secs(12);

/// Points per still-hidden character awarded for a correct solve.
pub const SOLVE_BONUS_PER_LETTER: u64 = 1000;

/// Chance that a bot spins again instead of guessing after a paid guess.
const BOT_RESPIN_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct WheelConfig {
    pub spin_reveal_timeout: Duration,
    /// Values the wheel can land on.
    pub segments: Vec<u32>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            spin_reveal_timeout: DEFAULT_SPIN_REVEAL_TIMEOUT,
            segments: segments::WHEEL_SEGMENTS.to_vec(),
        }
    }
}

/// Server-private state of one wheel game.
struct WheelSession {
    phrase: String,
    category: String,
    guessed: Vec<char>,
    current_spin_value: u32,
    pending_spin_value: u32,
    spinner: Option<PlayerId>,
    phase: WheelPhase,
    /// The current spin value already paid out a correct guess.
    spin_paid: bool,
    reveal_deadline: Option<Instant>,
    message: String,
    winner: Option<PlayerId>,
}

impl WheelSession {
    fn new(picked: WheelPhrase) -> Self {
        Self {
            phrase: picked.phrase,
            category: picked.category,
            guessed: Vec::new(),
            current_spin_value: 0,
            pending_spin_value: 0,
            spinner: None,
            phase: WheelPhase::AwaitingSpin,
            spin_paid: false,
            reveal_deadline: None,
            message: "Spin the wheel!".to_string(),
            winner: None,
        }
    }

    fn start_spin(&mut self, spinner: PlayerId, value: u32, deadline: Instant) -> Vec<GameEvent> {
        self.spinner = Some(spinner);
        self.pending_spin_value = value;
        self.phase = WheelPhase::SpinPending;
        self.reveal_deadline = Some(deadline);
        self.message = "Spinning...".to_string();
        vec![GameEvent::SpinDrawn { value }]
    }

    /// Move the pending outcome into play.
    fn reveal(&mut self) -> Vec<GameEvent> {
        let value = std::mem::take(&mut self.pending_spin_value);
        self.current_spin_value = value;
        self.reveal_deadline = None;
        self.spin_paid = false;
        if value > 0 {
            self.phase = WheelPhase::AwaitingGuess;
            self.message = format!("The wheel landed on {value}. Guess a letter.");
            return Vec::new();
        }

        self.phase = WheelPhase::AwaitingSpin;
        self.message = "The wheel landed on 0. Score lost, next player.".to_string();
        let mut events = Vec::with_capacity(2);
        if let Some(spinner) = self.spinner {
            events.push(GameEvent::ScoreReset { player_id: spinner });
        }
        events.push(GameEvent::TurnEnded);
        events
    }

    /// End the turn without reward.
    fn miss(&mut self, message: String) -> Vec<GameEvent> {
        self.phase = WheelPhase::AwaitingSpin;
        self.current_spin_value = 0;
        self.spin_paid = false;
        self.message = message;
        vec![GameEvent::TurnEnded]
    }

    fn finish(&mut self, winner: PlayerId, message: String) -> GameEvent {
        self.phase = WheelPhase::Finished;
        self.winner = Some(winner);
        self.reveal_deadline = None;
        self.pending_spin_value = 0;
        self.message = message;
        GameEvent::Finished {
            winner: Some(winner),
        }
    }

    fn guess(&mut self, player_id: PlayerId, letter: char) -> Result<Vec<GameEvent>, RoomError> {
        if self.phase != WheelPhase::AwaitingGuess || self.current_spin_value == 0 {
            return Err(RoomError::invalid("spin the wheel before guessing"));
        }
        let letter = phrase::fold(letter);
        if self.guessed.contains(&letter) {
            return Ok(self.miss(format!("{letter} was already guessed. Next player.")));
        }
        self.guessed.push(letter);

        let count = phrase::count_occurrences(&self.phrase, letter);
        if count == 0 {
            return Ok(self.miss(format!("No {letter} in the phrase. Next player.")));
        }

        let points = count as u64 * u64::from(self.current_spin_value);
        self.spin_paid = true;
        let mut events = vec![GameEvent::ScoreAwarded { player_id, points }];
        if phrase::hidden_count(&self.phrase, &self.guessed) == 0 {
            events.push(self.finish(player_id, "Every letter is revealed!".to_string()));
        } else {
            self.message = format!("{count} x {letter}! +{points} points.");
        }
        Ok(events)
    }

    fn solve(&mut self, player_id: PlayerId, attempt: &str) -> Result<Vec<GameEvent>, RoomError> {
        if self.phase == WheelPhase::SpinPending {
            return Err(RoomError::invalid("wait for the wheel to stop"));
        }
        if !phrase::matches_solution(&self.phrase, attempt) {
            return Ok(self.miss(format!("\"{attempt}\" is not the answer. Next player.")));
        }

        let hidden = phrase::hidden_count(&self.phrase, &self.guessed) as u64;
        let bonus = hidden * SOLVE_BONUS_PER_LETTER;
        let mut events = Vec::with_capacity(2);
        if bonus > 0 {
            events.push(GameEvent::ScoreAwarded {
                player_id,
                points: bonus,
            });
        }
        events.push(self.finish(
            player_id,
            format!("Solved! +{bonus} points ({hidden} hidden letters x {SOLVE_BONUS_PER_LETTER})."),
        ));
        Ok(events)
    }

    fn view(&self) -> WheelView {
        let game_over = self.phase == WheelPhase::Finished;
        WheelView {
            category: self.category.clone(),
            obscured_phrase: if game_over {
                self.phrase.clone()
            } else {
                phrase::obscure(&self.phrase, &self.guessed)
            },
            guessed_letters: self.guessed.clone(),
            current_spin_value: self.current_spin_value,
            pending_spin_value: self.pending_spin_value,
            phase: self.phase,
            game_over,
            message: self.message.clone(),
            phrase: game_over.then(|| self.phrase.clone()),
        }
    }
}

/// The Wheel-Spin-and-Guess engine.
///
/// Every random draw (phrase, segment, bot choices) comes from the owned
/// RNG, so a seeded engine replays identically.
pub struct WheelGame {
    phrases: Vec<WheelPhrase>,
    config: WheelConfig,
    rng: StdRng,
    last_phrase: Option<usize>,
    session: Option<WheelSession>,
}

impl WheelGame {
    pub fn new(phrases: Vec<WheelPhrase>, config: WheelConfig) -> Self {
        Self::with_rng(phrases, config, StdRng::from_os_rng())
    }

    pub fn with_seed(phrases: Vec<WheelPhrase>, config: WheelConfig, seed: u64) -> Self {
        Self::with_rng(phrases, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(phrases: Vec<WheelPhrase>, config: WheelConfig, rng: StdRng) -> Self {
        Self {
            phrases,
            config,
            rng,
            last_phrase: None,
            session: None,
        }
    }

    /// Current phase, `None` before the first `init`.
    pub fn phase(&self) -> Option<WheelPhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// Pick a phrase, avoiding an immediate repeat of the previous game's.
    fn pick_phrase(&mut self) -> WheelPhrase {
        let count = self.phrases.len();
        if count == 0 {
            return WheelPhrase {
                category: "Expression".to_string(),
                phrase: "RODA A RODA".to_string(),
            };
        }
        let mut index = self.rng.random_range(0..count);
        while count > 1 && Some(index) == self.last_phrase {
            index = self.rng.random_range(0..count);
        }
        self.last_phrase = Some(index);
        self.phrases[index].clone()
    }
}

impl GameEngine for WheelGame {
    fn kind(&self) -> GameKind {
        GameKind::Game
    }

    fn init(&mut self, players: &[Player], _now: Instant) -> Vec<GameEvent> {
        let picked = self.pick_phrase();
        tracing::debug!(
            category = %picked.category,
            players = players.len(),
            "Wheel session started"
        );
        self.session = Some(WheelSession::new(picked));
        Vec::new()
    }

    fn gate(&self, _intent: &GameIntent) -> IntentGate {
        IntentGate::Turn
    }

    fn apply(
        &mut self,
        player_id: PlayerId,
        intent: GameIntent,
        now: Instant,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let Some(session) = self.session.as_mut() else {
            return Err(RoomError::invalid("no game in progress"));
        };
        if session.phase == WheelPhase::Finished {
            return Err(RoomError::invalid("the game is over"));
        }

        match intent {
            GameIntent::SpinStart => match session.phase {
                // A second SPIN_START while animating is a client race, not an error.
                WheelPhase::SpinPending => Ok(Vec::new()),
                WheelPhase::AwaitingGuess if !session.spin_paid => {
                    Err(RoomError::invalid("guess a letter before spinning again"))
                },
                _ => {
                    let value = segments::draw_from(&self.config.segments, &mut self.rng);
                    let deadline = now + self.config.spin_reveal_timeout;
                    Ok(session.start_spin(player_id, value, deadline))
                },
            },
            GameIntent::SpinEnd => {
                if session.phase == WheelPhase::SpinPending {
                    Ok(session.reveal())
                } else {
                    Ok(Vec::new())
                }
            },
            GameIntent::Guess(letter) => session.guess(player_id, letter),
            GameIntent::Solve(attempt) => session.solve(player_id, &attempt),
            GameIntent::SubmitAnswer { .. } | GameIntent::NextQuestion => {
                Err(RoomError::invalid("not a wheel game intent"))
            },
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.reveal_deadline)
    }

    fn tick(&mut self, now: Instant) -> Vec<GameEvent> {
        match self.session.as_mut() {
            Some(session)
                if session.phase == WheelPhase::SpinPending
                    && session.reveal_deadline.is_some_and(|d| d <= now) =>
            {
                tracing::debug!(
                    spinner = ?session.spinner,
                    "Spin reveal timed out, revealing server-side"
                );
                session.reveal()
            },
            _ => Vec::new(),
        }
    }

    fn player_left(&mut self, player_id: PlayerId, _now: Instant) -> Vec<GameEvent> {
        if let Some(session) = self.session.as_mut()
            && session.spinner == Some(player_id)
            && matches!(
                session.phase,
                WheelPhase::SpinPending | WheelPhase::AwaitingGuess
            )
        {
            session.phase = WheelPhase::AwaitingSpin;
            session.pending_spin_value = 0;
            session.current_spin_value = 0;
            session.spin_paid = false;
            session.reveal_deadline = None;
            session.message = "The spinner left. Spin the wheel!".to_string();
        }
        Vec::new()
    }

    fn bot_intent(&mut self, bot_id: PlayerId, holds_turn: bool) -> Option<GameIntent> {
        if !holds_turn {
            return None;
        }
        let session = self.session.as_ref()?;
        match session.phase {
            WheelPhase::AwaitingSpin => Some(GameIntent::SpinStart),
            WheelPhase::SpinPending => (session.spinner == Some(bot_id)).then_some(GameIntent::SpinEnd),
            WheelPhase::AwaitingGuess => {
                if session.spin_paid && self.rng.random_bool(BOT_RESPIN_PROBABILITY) {
                    return Some(GameIntent::SpinStart);
                }
                match bot::choose_move(&session.phrase, &session.guessed, &mut self.rng)? {
                    BotMove::Guess(letter) => Some(GameIntent::Guess(letter)),
                    BotMove::Solve(attempt) => Some(GameIntent::Solve(attempt)),
                }
            },
            WheelPhase::Finished => None,
        }
    }

    fn view(&self, _now: Instant) -> SessionView {
        let view = match &self.session {
            Some(session) => session.view(),
            None => WheelView {
                category: String::new(),
                obscured_phrase: String::new(),
                guessed_letters: Vec::new(),
                current_spin_value: 0,
                pending_spin_value: 0,
                phase: WheelPhase::AwaitingSpin,
                game_over: false,
                message: String::new(),
                phrase: None,
            },
        };
        SessionView::Wheel(view)
    }

    fn is_finished(&self) -> bool {
        self.phase() == Some(WheelPhase::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roletrando_core::test_helpers::{make_players, run_engine_ticks, sample_phrase};

    fn wheel_view(game: &WheelGame, now: Instant) -> WheelView {
        match game.view(now) {
            SessionView::Wheel(v) => v,
            other => panic!("expected wheel view, got {other:?}"),
        }
    }

    fn started_game() -> (WheelGame, Instant) {
        let mut game = WheelGame::with_seed(vec![sample_phrase()], WheelConfig::default(), 11);
        let now = Instant::now();
        game.init(&make_players(2), now);
        (game, now)
    }

    /// Put a known spin value in play for `player`.
    fn land_on(game: &mut WheelGame, player: PlayerId, value: u32, now: Instant) -> Vec<GameEvent> {
        let session = game.session.as_mut().unwrap();
        session.start_spin(player, value, now + DEFAULT_SPIN_REVEAL_TIMEOUT);
        game.apply(player, GameIntent::SpinEnd, now).unwrap()
    }

    #[test]
    fn init_masks_whole_phrase() {
        let (game, now) = started_game();
        let view = wheel_view(&game, now);
        assert_eq!(view.category, "Cidade");
        assert_eq!(view.obscured_phrase, "___ _____");
        assert_eq!(view.phase, WheelPhase::AwaitingSpin);
        assert!(!view.game_over);
        assert_eq!(view.phrase, None);
    }

    #[test]
    fn spin_start_draws_pending_value() {
        let (mut game, now) = started_game();
        let events = game.apply(1, GameIntent::SpinStart, now).unwrap();
        let [GameEvent::SpinDrawn { value }] = events.as_slice() else {
            panic!("expected a single SpinDrawn, got {events:?}");
        };
        assert!(segments::WHEEL_SEGMENTS.contains(value));
        let view = wheel_view(&game, now);
        assert_eq!(view.phase, WheelPhase::SpinPending);
        assert_eq!(view.pending_spin_value, *value);
        assert_eq!(view.current_spin_value, 0);
    }

    #[test]
    fn spin_end_reveals_pending_value() {
        let (mut game, now) = started_game();
        let events = land_on(&mut game, 1, 500, now);
        assert!(events.is_empty());
        let view = wheel_view(&game, now);
        assert_eq!(view.current_spin_value, 500);
        assert_eq!(view.pending_spin_value, 0);
        assert_eq!(view.phase, WheelPhase::AwaitingGuess);
    }

    #[test]
    fn out_of_order_spin_messages_are_dropped() {
        let (mut game, now) = started_game();
        assert!(game.apply(1, GameIntent::SpinEnd, now).unwrap().is_empty());
        assert_eq!(game.phase(), Some(WheelPhase::AwaitingSpin));

        game.apply(1, GameIntent::SpinStart, now).unwrap();
        let pending = wheel_view(&game, now).pending_spin_value;
        assert!(game.apply(1, GameIntent::SpinStart, now).unwrap().is_empty());
        assert_eq!(wheel_view(&game, now).pending_spin_value, pending);
    }

    #[test]
    fn guess_before_spin_is_rejected() {
        let (mut game, now) = started_game();
        let err = game.apply(1, GameIntent::Guess('A'), now).unwrap_err();
        assert!(matches!(err, RoomError::InvalidIntent(_)));
    }

    #[test]
    fn correct_letter_pays_per_occurrence_and_keeps_turn() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 300, now);
        let events = game.apply(1, GameIntent::Guess('o'), now).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::ScoreAwarded {
                player_id: 1,
                points: 600
            }]
        );
        let view = wheel_view(&game, now);
        assert_eq!(view.phase, WheelPhase::AwaitingGuess);
        assert_eq!(view.current_spin_value, 300);
        assert_eq!(view.obscured_phrase, "__O ____O");
        assert_eq!(view.guessed_letters, vec!['O']);
    }

    #[test]
    fn zero_segment_resets_score_and_ends_turn() {
        let (mut game, now) = started_game();
        let events = land_on(&mut game, 2, 0, now);
        assert_eq!(
            events,
            vec![GameEvent::ScoreReset { player_id: 2 }, GameEvent::TurnEnded]
        );
        assert_eq!(game.phase(), Some(WheelPhase::AwaitingSpin));
        assert!(game.apply(2, GameIntent::Guess('A'), now).is_err());
    }

    #[test]
    fn missed_or_repeated_letter_ends_turn() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 200, now);
        assert_eq!(
            game.apply(1, GameIntent::Guess('Z'), now).unwrap(),
            vec![GameEvent::TurnEnded]
        );
        assert_eq!(wheel_view(&game, now).current_spin_value, 0);

        land_on(&mut game, 2, 200, now);
        assert_eq!(
            game.apply(2, GameIntent::Guess('Z'), now).unwrap(),
            vec![GameEvent::TurnEnded]
        );
    }

    #[test]
    fn respin_only_after_a_paid_guess() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 100, now);
        assert!(game.apply(1, GameIntent::SpinStart, now).is_err());
        game.apply(1, GameIntent::Guess('A'), now).unwrap();
        let events = game.apply(1, GameIntent::SpinStart, now).unwrap();
        assert!(matches!(events.as_slice(), [GameEvent::SpinDrawn { .. }]));
    }

    #[test]
    fn revealing_last_letter_wins() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 100, now);
        for letter in ['S', 'A', 'O', 'P', 'U'] {
            game.apply(1, GameIntent::Guess(letter), now).unwrap();
        }
        let events = game.apply(1, GameIntent::Guess('L'), now).unwrap();
        assert_eq!(
            events.last(),
            Some(&GameEvent::Finished { winner: Some(1) })
        );
        assert!(game.is_finished());
        let view = wheel_view(&game, now);
        assert_eq!(view.obscured_phrase, "SAO PAULO");
        assert_eq!(view.phrase.as_deref(), Some("SAO PAULO"));
        assert!(game.apply(2, GameIntent::SpinStart, now).is_err());
    }

    #[test]
    fn digits_in_the_phrase_do_not_block_the_win() {
        let phrase = WheelPhrase {
            category: "Esporte".into(),
            phrase: "COPA 2014".into(),
        };
        let mut game = WheelGame::with_seed(vec![phrase], WheelConfig::default(), 5);
        let now = Instant::now();
        game.init(&make_players(2), now);
        assert_eq!(wheel_view(&game, now).obscured_phrase, "____ 2014");

        land_on(&mut game, 1, 100, now);
        let mut events = Vec::new();
        for letter in ['C', 'O', 'P', 'A'] {
            events = game.apply(1, GameIntent::Guess(letter), now).unwrap();
        }
        assert_eq!(
            events.last(),
            Some(&GameEvent::Finished { winner: Some(1) })
        );
        assert_eq!(wheel_view(&game, now).obscured_phrase, "COPA 2014");
    }

    #[test]
    fn configured_segments_drive_the_draw() {
        let config = WheelConfig {
            segments: vec![0],
            ..WheelConfig::default()
        };
        let mut game = WheelGame::with_seed(vec![sample_phrase()], config, 11);
        let now = Instant::now();
        game.init(&make_players(2), now);
        let events = game.apply(1, GameIntent::SpinStart, now).unwrap();
        assert_eq!(events, vec![GameEvent::SpinDrawn { value: 0 }]);
    }

    #[test]
    fn correct_solve_pays_per_hidden_letter() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 100, now);
        game.apply(1, GameIntent::Guess('A'), now).unwrap();
        // S O P U L O remain hidden.
        let events = game
            .apply(1, GameIntent::Solve("sao  paulo".into()), now)
            .unwrap();
        assert_eq!(
            events,
            vec![
                GameEvent::ScoreAwarded {
                    player_id: 1,
                    points: 6000
                },
                GameEvent::Finished { winner: Some(1) },
            ]
        );
    }

    #[test]
    fn solve_is_allowed_before_spinning() {
        let (mut game, now) = started_game();
        let events = game
            .apply(1, GameIntent::Solve("SAO PAULO".into()), now)
            .unwrap();
        assert!(events.contains(&GameEvent::ScoreAwarded {
            player_id: 1,
            points: 8000
        }));
    }

    #[test]
    fn wrong_solve_ends_turn() {
        let (mut game, now) = started_game();
        let events = game
            .apply(1, GameIntent::Solve("RIO DE JANEIRO".into()), now)
            .unwrap();
        assert_eq!(events, vec![GameEvent::TurnEnded]);
        assert!(!game.is_finished());
    }

    #[test]
    fn solve_while_spinning_is_rejected() {
        let (mut game, now) = started_game();
        game.apply(1, GameIntent::SpinStart, now).unwrap();
        assert!(
            game.apply(1, GameIntent::Solve("SAO PAULO".into()), now)
                .is_err()
        );
    }

    #[test]
    fn pending_spin_reveals_on_timeout() {
        let (mut game, now) = started_game();
        game.apply(1, GameIntent::SpinStart, now).unwrap();
        let deadline = game.next_deadline().unwrap();
        assert_eq!(deadline, now + DEFAULT_SPIN_REVEAL_TIMEOUT);

        assert!(game.tick(now + Duration::from_secs(1)).is_empty());
        assert_eq!(game.phase(), Some(WheelPhase::SpinPending));

        run_engine_ticks(&mut game, now, 13, Duration::from_secs(1));
        assert_ne!(game.phase(), Some(WheelPhase::SpinPending));
        assert_eq!(game.next_deadline(), None);
    }

    #[test]
    fn spinner_leaving_resets_the_turn_state() {
        let (mut game, now) = started_game();
        land_on(&mut game, 1, 800, now);
        assert!(game.player_left(1, now).is_empty());
        let view = wheel_view(&game, now);
        assert_eq!(view.phase, WheelPhase::AwaitingSpin);
        assert_eq!(view.current_spin_value, 0);
    }

    #[test]
    fn quiz_intents_are_invalid() {
        let (mut game, now) = started_game();
        assert!(game.apply(1, GameIntent::NextQuestion, now).is_err());
        assert!(
            game.apply(1, GameIntent::SubmitAnswer { answer_index: 0 }, now)
                .is_err()
        );
    }

    #[test]
    fn bot_spins_then_reveals_then_plays() {
        let (mut game, now) = started_game();
        assert_eq!(game.bot_intent(2, false), None);
        assert_eq!(game.bot_intent(2, true), Some(GameIntent::SpinStart));

        land_on(&mut game, 2, 400, now);
        match game.bot_intent(2, true) {
            Some(GameIntent::Guess(c)) => assert_eq!(c, 'A'),
            other => panic!("expected a guess, got {other:?}"),
        }
    }

    #[test]
    fn bot_only_ends_its_own_spin() {
        let (mut game, now) = started_game();
        game.apply(1, GameIntent::SpinStart, now).unwrap();
        assert_eq!(game.bot_intent(2, true), None);
        assert_eq!(game.bot_intent(1, true), Some(GameIntent::SpinEnd));
    }

    #[test]
    fn consecutive_games_use_different_phrases() {
        let phrases = vec![
            sample_phrase(),
            WheelPhrase {
                category: "Fruta".into(),
                phrase: "MARACUJA".into(),
            },
        ];
        let mut game = WheelGame::with_seed(phrases, WheelConfig::default(), 5);
        let now = Instant::now();
        let players = make_players(2);
        let mut previous = None;
        for _ in 0..10 {
            game.init(&players, now);
            let category = wheel_view(&game, now).category;
            assert_ne!(previous.as_ref(), Some(&category));
            previous = Some(category);
        }
    }
}
