pub mod content;
pub mod error;
pub mod game_trait;
pub mod net;
pub mod player;
pub mod room;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::time::{Duration, Instant};

    use crate::content::{Question, QuestionLevel, WheelPhrase};
    use crate::game_trait::{GameEngine, GameEvent, PlayerId};
    use crate::player::Player;

    /// Create `n` test players with sequential IDs starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as PlayerId + 1, format!("Player{}", i + 1)))
            .collect()
    }

    /// A wheel phrase with known letter counts: two Os and two As.
    pub fn sample_phrase() -> WheelPhrase {
        WheelPhrase {
            category: "Cidade".to_string(),
            phrase: "SAO PAULO".to_string(),
        }
    }

    /// `levels` question levels of `per_level` questions each. The correct
    /// answer of every question is option 1.
    pub fn sample_levels(levels: u32, per_level: usize) -> Vec<QuestionLevel> {
        (1..=levels)
            .map(|level| QuestionLevel {
                level,
                label: format!("Level {level}"),
                prize: String::new(),
                questions: (0..per_level)
                    .map(|i| Question {
                        question: format!("Question {level}.{i}?"),
                        options: vec![
                            "Wrong A".to_string(),
                            "Right".to_string(),
                            "Wrong B".to_string(),
                            "Wrong C".to_string(),
                        ],
                        answer: 1,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Advance an engine's clock by `steps` ticks of `step`, returning every
    /// event it emitted and the final instant.
    pub fn run_engine_ticks(
        engine: &mut dyn GameEngine,
        start: Instant,
        steps: u32,
        step: Duration,
    ) -> (Vec<GameEvent>, Instant) {
        let mut now = start;
        let mut events = Vec::new();
        for _ in 0..steps {
            now += step;
            events.extend(engine.tick(now));
        }
        (events, now)
    }
}
