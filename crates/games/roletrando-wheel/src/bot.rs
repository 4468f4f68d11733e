use rand::Rng;

use crate::phrase;

/// Letters ordered by how often they show up in Portuguese text.
pub const LETTER_FREQUENCY: &str = "AEOSRINDMUTCLPVGHQBFZJXKWY";

/// Distinct hidden letters at or below which a bot may try to solve.
pub const SOLVE_THRESHOLD: usize = 2;

/// What a bot does once it has a spin value to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotMove {
    Guess(char),
    Solve(String),
}

/// Most frequent letter not guessed yet.
pub fn next_letter(guessed: &[char]) -> Option<char> {
    LETTER_FREQUENCY.chars().find(|c| !guessed.contains(c))
}

/// Pick a guess or a solve attempt for the current board.
pub fn choose_move(phrase: &str, guessed: &[char], rng: &mut impl Rng) -> Option<BotMove> {
    let hidden = phrase::hidden_letters(phrase, guessed);
    if !hidden.is_empty() && hidden.len() <= SOLVE_THRESHOLD && rng.random_bool(0.5) {
        return Some(BotMove::Solve(phrase.to_string()));
    }
    next_letter(guessed)
        .map(BotMove::Guess)
        .or_else(|| (!hidden.is_empty()).then(|| BotMove::Solve(phrase.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn skips_guessed_letters() {
        assert_eq!(next_letter(&[]), Some('A'));
        assert_eq!(next_letter(&['A', 'E']), Some('O'));
    }

    #[test]
    fn runs_out_of_letters() {
        let all: Vec<char> = LETTER_FREQUENCY.chars().collect();
        assert_eq!(next_letter(&all), None);
    }

    #[test]
    fn never_solves_early() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(matches!(
                choose_move("SAO PAULO", &[], &mut rng),
                Some(BotMove::Guess(_))
            ));
        }
    }

    #[test]
    fn may_solve_near_the_end() {
        let mut rng = StdRng::seed_from_u64(3);
        let guessed = ['S', 'A', 'O', 'P', 'U'];
        let solved = (0..50).any(|_| {
            matches!(
                choose_move("SAO PAULO", &guessed, &mut rng),
                Some(BotMove::Solve(_))
            )
        });
        assert!(solved);
    }

    #[test]
    fn digits_do_not_count_as_hidden_letters() {
        let mut rng = StdRng::seed_from_u64(5);
        let all: Vec<char> = LETTER_FREQUENCY.chars().collect();
        assert_eq!(choose_move("COPA 2014", &all, &mut rng), None);
    }
}
