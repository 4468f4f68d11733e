use std::time::Duration;

/// Points for an instant correct answer.
pub const MAX_POINTS: u64 = 1000;

/// Points for a correct answer given with `remaining` time left in a round
/// of `round` total: `floor(1000 * remaining / round)`.
pub fn speed_points(remaining: Duration, round: Duration) -> u64 {
    let round_ms = round.as_millis();
    if round_ms == 0 {
        return 0;
    }
    let remaining_ms = remaining.min(round).as_millis();
    (u128::from(MAX_POINTS) * remaining_ms / round_ms) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUND: Duration = Duration::from_secs(20);

    #[test]
    fn instant_answer_scores_max() {
        assert_eq!(speed_points(ROUND, ROUND), 1000);
    }

    #[test]
    fn half_time_scores_half() {
        assert_eq!(speed_points(Duration::from_secs(10), ROUND), 500);
    }

    #[test]
    fn rounds_down() {
        // 1000 * 19_999 / 20_000 = 999.95
        assert_eq!(speed_points(Duration::from_millis(19_999), ROUND), 999);
        assert_eq!(speed_points(Duration::from_millis(19), ROUND), 0);
    }

    #[test]
    fn no_time_left_scores_nothing() {
        assert_eq!(speed_points(Duration::ZERO, ROUND), 0);
    }

    #[test]
    fn remaining_is_clamped_to_round() {
        assert_eq!(speed_points(Duration::from_secs(60), ROUND), 1000);
        assert_eq!(speed_points(Duration::from_secs(5), Duration::ZERO), 0);
    }
}
