use rand::Rng;

/// Wheel segments in clockwise order, as drawn on the client.
pub const WHEEL_SEGMENTS: [u32; 10] = [100, 500, 200, 1000, 0, 300, 600, 150, 800, 400];

/// Draw a segment value uniformly.
pub fn draw(rng: &mut impl Rng) -> u32 {
    draw_from(&WHEEL_SEGMENTS, rng)
}

/// Draw uniformly from a custom wheel. An empty wheel falls back to the standard one.
pub fn draw_from(segments: &[u32], rng: &mut impl Rng) -> u32 {
    let segments = if segments.is_empty() {
        &WHEEL_SEGMENTS[..]
    } else {
        segments
    };
    segments[rng.random_range(0..segments.len())]
}

/// Index of the segment a client should animate toward for `value`.
pub fn segment_index(value: u32) -> Option<usize> {
    WHEEL_SEGMENTS.iter().position(|&v| v == value)
}
