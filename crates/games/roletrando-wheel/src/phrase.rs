//! Phrase masking and matching.
//!
//! Letters are guessable and masked with `_` until guessed. Everything else
//! (digits, spaces, hyphens, apostrophes) is shown as-is, since `GUESS` only
//! carries letters.

/// Placeholder shown for a guessable character that was not guessed yet.
pub const MASK: char = '_';

/// Whether a character of the phrase is hidden until guessed.
pub fn is_guessable(c: char) -> bool {
    c.is_alphabetic()
}

/// Upper-case form used for every letter comparison.
pub fn fold(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Render the phrase with every unguessed guessable character masked.
pub fn obscure(phrase: &str, guessed: &[char]) -> String {
    phrase
        .chars()
        .map(|c| {
            if is_guessable(c) && !guessed.contains(&fold(c)) {
                MASK
            } else {
                c
            }
        })
        .collect()
}

/// Number of positions in the phrase holding `letter`, case-insensitively.
pub fn count_occurrences(phrase: &str, letter: char) -> usize {
    let letter = fold(letter);
    phrase.chars().filter(|&c| fold(c) == letter).count()
}

/// Number of guessable characters still masked.
pub fn hidden_count(phrase: &str, guessed: &[char]) -> usize {
    phrase
        .chars()
        .filter(|&c| is_guessable(c) && !guessed.contains(&fold(c)))
        .count()
}

/// Distinct unguessed letters, in order of first appearance.
pub fn hidden_letters(phrase: &str, guessed: &[char]) -> Vec<char> {
    let mut letters = Vec::new();
    for c in phrase.chars().filter(|&c| is_guessable(c)).map(fold) {
        if !guessed.contains(&c) && !letters.contains(&c) {
            letters.push(c);
        }
    }
    letters
}

/// Upper-case with runs of whitespace collapsed to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.chars().map(fold).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case- and whitespace-insensitive comparison of a solve attempt.
pub fn matches_solution(phrase: &str, attempt: &str) -> bool {
    normalize(phrase) == normalize(attempt)
}
