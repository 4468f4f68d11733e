use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use roletrando_core::game_trait::PlayerId;
use roletrando_core::player::Player;

/// Identifies one WebSocket connection for the lifetime of the process.
pub type ConnId = u64;

/// What a room sends down a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A pre-encoded text frame.
    Frame(Utf8Bytes),
    /// Close the socket after flushing earlier frames.
    Close,
}

pub type ConnSender = mpsc::Sender<Outbound>;

/// The live connection a player is currently bound to.
#[derive(Debug, Clone)]
pub struct Binding {
    pub conn_id: ConnId,
    pub sender: ConnSender,
}

#[derive(Debug)]
struct Entry {
    player: Player,
    binding: Option<Binding>,
    /// Set while a human is inside the reconnect grace period.
    disconnected_at: Option<Instant>,
}

/// Players of one room in join order, plus the `(room, name) -> connection`
/// binding table. Owned by the room actor.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    entries: Vec<Entry>,
    host_id: Option<PlayerId>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    /// Public player list in join order.
    pub fn players(&self) -> Vec<Player> {
        self.entries.iter().map(|e| e.player.clone()).collect()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.entry(id).map(|e| &e.player)
    }

    pub fn get_at(&self, index: usize) -> Option<&Player> {
        self.entries.get(index).map(|e| &e.player)
    }

    pub fn position(&self, id: PlayerId) -> Option<usize> {
        self.entries.iter().position(|e| e.player.id == id)
    }

    /// Human player registered under exactly this name.
    pub fn find_human(&self, name: &str) -> Option<PlayerId> {
        self.entries
            .iter()
            .find(|e| !e.player.is_bot && e.player.name == name)
            .map(|e| e.player.id)
    }

    /// True if any player's name matches ignoring letter case.
    pub fn name_taken(&self, name: &str) -> bool {
        self.entries.iter().any(|e| same_name(&e.player.name, name))
    }

    /// Append a player. The first human to join becomes host.
    pub fn add(&mut self, mut player: Player, binding: Option<Binding>) {
        player.connected = player.is_bot || binding.is_some();
        if self.host_id.is_none() && !player.is_bot {
            self.host_id = Some(player.id);
        }
        self.entries.push(Entry {
            player,
            binding,
            disconnected_at: None,
        });
    }

    /// Bind `id` to a new connection, returning the binding it replaced.
    pub fn bind(&mut self, id: PlayerId, binding: Binding) -> Option<Binding> {
        let entry = self.entry_mut(id)?;
        entry.player.connected = true;
        entry.disconnected_at = None;
        entry.binding.replace(binding)
    }

    /// Drop the binding of `id` if it still points at `conn_id`. A close
    /// from a socket that was already replaced returns false.
    pub fn unbind(&mut self, id: PlayerId, conn_id: ConnId, now: Instant) -> bool {
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        if entry.binding.as_ref().is_none_or(|b| b.conn_id != conn_id) {
            return false;
        }
        entry.binding = None;
        entry.player.connected = false;
        entry.disconnected_at = Some(now);
        true
    }

    /// Whether `conn_id` is the connection currently bound to `id`.
    pub fn is_bound(&self, id: PlayerId, conn_id: ConnId) -> bool {
        self.entry(id)
            .and_then(|e| e.binding.as_ref())
            .is_some_and(|b| b.conn_id == conn_id)
    }

    pub fn binding(&self, id: PlayerId) -> Option<&Binding> {
        self.entry(id).and_then(|e| e.binding.as_ref())
    }

    /// Every live binding, in join order.
    pub fn bindings(&self) -> impl Iterator<Item = (PlayerId, &Binding)> {
        self.entries
            .iter()
            .filter_map(|e| e.binding.as_ref().map(|b| (e.player.id, b)))
    }

    /// Detach every binding, e.g. on shutdown.
    pub fn take_bindings(&mut self) -> Vec<Binding> {
        self.entries
            .iter_mut()
            .filter_map(|e| e.binding.take())
            .collect()
    }

    /// Remove a player for good. Returns their former index. If they were
    /// host, the earliest remaining connected human takes over, then any
    /// remaining human.
    pub fn remove(&mut self, id: PlayerId) -> Option<(usize, Player)> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        if self.host_id == Some(id) {
            self.host_id = self
                .entries
                .iter()
                .find(|e| !e.player.is_bot && e.player.connected)
                .or_else(|| self.entries.iter().find(|e| !e.player.is_bot))
                .map(|e| e.player.id);
        }
        Some((index, entry.player))
    }

    pub fn connected_humans(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.player.is_bot && e.player.connected)
            .count()
    }

    pub fn bots(&self) -> Vec<PlayerId> {
        self.entries
            .iter()
            .filter(|e| e.player.is_bot)
            .map(|e| e.player.id)
            .collect()
    }

    /// When the next disconnected player runs out of grace.
    pub fn next_eviction(&self, grace: Duration) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|e| e.disconnected_at)
            .min()
            .map(|at| at + grace)
    }

    /// Players whose grace period has run out at `now`.
    pub fn expired(&self, now: Instant, grace: Duration) -> Vec<PlayerId> {
        self.entries
            .iter()
            .filter(|e| e.disconnected_at.is_some_and(|at| at + grace <= now))
            .map(|e| e.player.id)
            .collect()
    }

    pub fn add_score(&mut self, id: PlayerId, points: u64) {
        if let Some(entry) = self.entry_mut(id) {
            entry.player.score = entry.player.score.saturating_add(points);
        }
    }

    pub fn reset_score(&mut self, id: PlayerId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.player.score = 0;
        }
    }

    pub fn reset_scores(&mut self) {
        for entry in &mut self.entries {
            entry.player.score = 0;
        }
    }

    fn entry(&self, id: PlayerId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.player.id == id)
    }

    fn entry_mut(&mut self, id: PlayerId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.player.id == id)
    }
}
