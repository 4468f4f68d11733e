use roletrando_core::game_trait::PlayerId;
use roletrando_core::player::Player;

/// Whose turn it is in a wheel game, as an index into the room's player
/// list (join order).
///
/// The index only moves through `advance` (miss, failed solve, zero spin)
/// and `remove_at` (eviction); it is never touched otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnScheduler {
    index: usize,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn holder(&self, players: &[Player]) -> Option<PlayerId> {
        players.get(self.index).map(|p| p.id)
    }

    /// Pass the turn to the next player in join order. Players inside their
    /// reconnect grace period are skipped while anyone else is connected.
    pub fn advance(&mut self, players: &[Player]) {
        let len = players.len();
        if len == 0 {
            self.index = 0;
            return;
        }
        let next = (1..=len)
            .map(|step| (self.index + step) % len)
            .find(|&i| players[i].connected);
        self.index = next.unwrap_or((self.index + 1) % len);
    }

    /// Re-normalize after the player at `removed` left the list, which now
    /// holds `remaining` players. The same holder keeps the turn when they
    /// are still there; if the holder left, the next player in order gets it.
    pub fn remove_at(&mut self, removed: usize, remaining: usize) {
        if remaining == 0 {
            self.index = 0;
            return;
        }
        if removed < self.index {
            self.index -= 1;
        }
        if self.index >= remaining {
            self.index = 0;
        }
    }
}
