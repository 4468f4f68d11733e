use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Process-wide counters behind `/api/stats/stats`.
#[derive(Debug)]
pub struct ServerStats {
    started: Instant,
    requests: AtomicU64,
    games_created: AtomicU64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            games_created: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_game_created(&self) {
        self.games_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn games_created(&self) -> u64 {
        self.games_created.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> String {
        format_uptime(self.started.elapsed())
    }
}

/// `"%dd %dh %dm %ds"`, e.g. `"1d 2h 3m 4s"`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

/// One player's aggregated results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub player_name: String,
    pub total_score: u64,
    pub games_played: u64,
    pub wins: u64,
}

/// Distinct names the ranking keeps. A new name beyond this replaces the
/// lowest-scoring entry.
pub const MAX_RANKING_ENTRIES: usize = 10_000;

/// In-memory leaderboard fed by finished games. Not persisted.
#[derive(Debug)]
pub struct Ranking {
    entries: Mutex<HashMap<String, RankingEntry>>,
    capacity: usize,
}

impl Default for Ranking {
    fn default() -> Self {
        Self::with_capacity(MAX_RANKING_ENTRIES)
    }
}

impl Ranking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record one player's result for a finished game.
    pub fn record(&self, player_name: &str, game: &str, score: u64, winner: bool) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::error!("Ranking lock poisoned, dropping result");
            return;
        };
        if entries.len() >= self.capacity && !entries.contains_key(player_name) {
            let lowest = entries
                .values()
                .min_by(|a, b| {
                    a.total_score
                        .cmp(&b.total_score)
                        .then_with(|| b.player_name.cmp(&a.player_name))
                })
                .map(|e| e.player_name.clone());
            if let Some(name) = lowest {
                tracing::debug!(evicted = %name, "Ranking full, dropping lowest entry");
                entries.remove(&name);
            }
        }
        let entry = entries
            .entry(player_name.to_string())
            .or_insert_with(|| RankingEntry {
                player_name: player_name.to_string(),
                total_score: 0,
                games_played: 0,
                wins: 0,
            });
        entry.total_score = entry.total_score.saturating_add(score);
        entry.games_played = entry.games_played.saturating_add(1);
        if winner {
            entry.wins = entry.wins.saturating_add(1);
        }
        tracing::info!(
            player = player_name,
            game,
            score,
            winner,
            "Recorded game result"
        );
    }

    /// Entries sorted by total score, highest first. Ties go by name.
    pub fn snapshot(&self) -> Vec<RankingEntry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut list: Vec<RankingEntry> = entries.values().cloned().collect();
        list.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.player_name.cmp(&b.player_name))
        });
        list
    }
}
