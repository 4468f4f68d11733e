//! Millionaire lifelines. The correct answer never leaves the server; the
//! lifelines only reveal what a player would see on the show.

use rand::Rng;
use rand::seq::SliceRandom;

use roletrando_core::content::Question;

/// Wrong options hidden by the 50:50 lifeline.
pub const FIFTY_FIFTY_HIDDEN: usize = 2;

/// Pick two distinct wrong options to hide. Fewer are hidden when the
/// question does not have enough wrong options.
pub fn fifty_fifty(question: &Question, rng: &mut impl Rng) -> Vec<usize> {
    let mut wrong: Vec<usize> = (0..question.options.len())
        .filter(|&i| i != question.answer)
        .collect();
    wrong.shuffle(rng);
    wrong.truncate(FIFTY_FIFTY_HIDDEN);
    wrong.sort_unstable();
    wrong
}

/// Simulated audience vote in percent, one entry per option.
///
/// The correct option gets 50..=79, the remainder is spread at random over
/// the wrong options and the total is always 100.
pub fn audience(question: &Question, rng: &mut impl Rng) -> Vec<u32> {
    let count = question.options.len();
    let mut votes = vec![0u32; count];
    if count == 0 {
        return votes;
    }
    if count == 1 || question.answer >= count {
        votes[question.answer.min(count - 1)] = 100;
        return votes;
    }

    let correct = rng.random_range(50..80);
    votes[question.answer] = correct;
    let mut remaining = 100 - correct;

    let wrong: Vec<usize> = (0..count).filter(|&i| i != question.answer).collect();
    let last = wrong.len() - 1;
    for (n, &i) in wrong.iter().enumerate() {
        let share = if n == last || remaining == 0 {
            remaining
        } else {
            rng.random_range(0..remaining)
        };
        votes[i] = share;
        remaining -= share;
    }
    votes
}

/// Index of another question in a level of `len` questions, avoiding
/// `exclude`. `None` when the level has nothing else to offer.
pub fn skip_index(len: usize, exclude: Option<usize>, rng: &mut impl Rng) -> Option<usize> {
    let candidates: Vec<usize> = (0..len).filter(|&i| Some(i) != exclude).collect();
    if candidates.is_empty() || (len <= 1 && exclude.is_some()) {
        return None;
    }
    Some(candidates[rng.random_range(0..candidates.len())])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn question(answer: usize) -> Question {
        Question {
            question: "Qual é a capital do Brasil?".to_string(),
            options: vec![
                "Rio de Janeiro".to_string(),
                "Brasília".to_string(),
                "São Paulo".to_string(),
                "Salvador".to_string(),
            ],
            answer,
        }
    }

    #[test]
    fn fifty_fifty_hides_two_wrong_options() {
        let mut rng = StdRng::seed_from_u64(11);
        for answer in 0..4 {
            let q = question(answer);
            for _ in 0..50 {
                let hidden = fifty_fifty(&q, &mut rng);
                assert_eq!(hidden.len(), 2);
                assert_ne!(hidden[0], hidden[1]);
                assert!(!hidden.contains(&answer));
            }
        }
    }

    #[test]
    fn audience_favors_the_correct_answer() {
        let mut rng = StdRng::seed_from_u64(5);
        for answer in 0..4 {
            let q = question(answer);
            for _ in 0..100 {
                let votes = audience(&q, &mut rng);
                assert_eq!(votes.len(), 4);
                assert_eq!(votes.iter().sum::<u32>(), 100);
                assert!((50..=79).contains(&votes[answer]), "votes: {votes:?}");
            }
        }
    }

    #[test]
    fn skip_never_returns_excluded() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            assert_ne!(skip_index(3, Some(1), &mut rng), Some(1));
        }
        assert_eq!(skip_index(1, Some(0), &mut rng), None);
        assert_eq!(skip_index(0, None, &mut rng), None);
        assert_eq!(skip_index(1, None, &mut rng), Some(0));
    }
}
