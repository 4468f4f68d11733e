use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::content::ContentCatalog;
use crate::registry::ConnId;
use crate::room_actor::RoomContext;
use crate::room_manager::RoomManager;
use crate::stats::{Ranking, ServerStats};

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub content: Arc<ContentCatalog>,
    pub stats: Arc<ServerStats>,
    pub ranking: Arc<Ranking>,
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections, bound to a room or not.
    pub ws_connection_count: Arc<AtomicUsize>,
    next_conn_id: Arc<AtomicU64>,
    room_ctx: RoomContext,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let content = ContentCatalog::load(&config.content);
        Self::with_content(config, content)
    }

    /// State over an already loaded content catalog.
    pub fn with_content(config: ServerConfig, content: ContentCatalog) -> Self {
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new()));
        let content = Arc::new(content);
        let stats = Arc::new(ServerStats::new());
        let ranking = Arc::new(Ranking::new());
        let room_ctx = RoomContext::new(
            Arc::clone(&rooms),
            Arc::clone(&content),
            Arc::clone(&stats),
            Arc::clone(&ranking),
            &config,
        );
        Self {
            rooms,
            content,
            stats,
            ranking,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
            room_ctx,
        }
    }

    pub fn room_context(&self) -> &RoomContext {
        &self.room_ctx
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// RAII guard that increments a connection counter on creation and
/// decrements it on drop.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_tracks_count() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = ConnectionGuard::new(Arc::clone(&counter));
        let b = ConnectionGuard::new(Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        drop(a);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(b);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn connection_ids_are_unique() {
        let state = AppState::with_content(ServerConfig::default(), ContentCatalog::builtin());
        let a = state.next_conn_id();
        let b = state.clone().next_conn_id();
        assert_ne!(a, b);
    }
}
