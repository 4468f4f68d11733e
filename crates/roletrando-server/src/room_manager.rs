use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use roletrando_core::error::RoomError;
use roletrando_core::game_trait::PlayerId;
use roletrando_core::net::messages::ClientMessage;
use roletrando_core::room::{GameKind, RoomSnapshot, generate_room_code};

use crate::registry::{ConnId, ConnSender};
use crate::room_actor::{Joined, RoomCommand, RoomContext, spawn_room};

/// How a connection wants to reach its room, the `?mode=` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// The code must be free.
    Create,
    /// The room must already exist.
    Join,
    /// Create if absent, otherwise join.
    #[default]
    Auto,
}

/// Mailbox of one running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub code: String,
    pub kind: GameKind,
    generation: u64,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Bind a connection to `name` in this room.
    pub async fn connect(
        &self,
        name: String,
        conn_id: ConnId,
        sender: ConnSender,
    ) -> Result<Joined, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Connect {
                name,
                conn_id,
                sender,
                reply,
            })
            .await
            .map_err(|_| RoomError::SessionExpired)?;
        rx.await.map_err(|_| RoomError::SessionExpired)?
    }

    /// Forward a decoded client message. Fails only if the actor is gone.
    pub async fn send_message(
        &self,
        player_id: PlayerId,
        conn_id: ConnId,
        message: ClientMessage,
    ) -> Result<(), RoomError> {
        self.tx
            .send(RoomCommand::Message {
                player_id,
                conn_id,
                message,
            })
            .await
            .map_err(|_| RoomError::SessionExpired)
    }

    pub async fn disconnect(&self, player_id: PlayerId, conn_id: ConnId) {
        let _ = self
            .tx
            .send(RoomCommand::Disconnect { player_id, conn_id })
            .await;
    }

    /// Current snapshot, or `None` once the actor has stopped.
    pub async fn snapshot(&self) -> Option<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RoomCommand::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.try_send(RoomCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Directory of live rooms: `code -> mailbox`. Rooms own their state; this
/// map is only written when a room opens or its actor exits.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<String, RoomHandle>,
    next_generation: u64,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&RoomHandle> {
        self.rooms.get(code).filter(|h| !h.is_closed())
    }

    /// Resolve `code` according to `mode`, spawning a new room actor when
    /// one is needed.
    pub fn open(
        &mut self,
        code: &str,
        kind: GameKind,
        theme: Option<&str>,
        mode: JoinMode,
        ctx: &RoomContext,
    ) -> Result<RoomHandle, RoomError> {
        if self.rooms.get(code).is_some_and(RoomHandle::is_closed) {
            self.rooms.remove(code);
        }

        if let Some(handle) = self.rooms.get(code) {
            return match mode {
                JoinMode::Create => Err(RoomError::RoomAlreadyExists),
                _ if handle.kind != kind => Err(RoomError::RoomNotFound),
                _ => Ok(handle.clone()),
            };
        }

        if mode == JoinMode::Join {
            return Err(RoomError::RoomNotFound);
        }

        Ok(self.spawn(code, kind, theme, ctx))
    }

    /// Open a room under a newly generated code that no live room uses.
    pub fn create_room_with_fresh_code(
        &mut self,
        kind: GameKind,
        theme: Option<&str>,
        ctx: &RoomContext,
    ) -> RoomHandle {
        self.rooms.retain(|_, h| !h.is_closed());
        let code = loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };
        self.spawn(&code, kind, theme, ctx)
    }

    fn spawn(
        &mut self,
        code: &str,
        kind: GameKind,
        theme: Option<&str>,
        ctx: &RoomContext,
    ) -> RoomHandle {
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = spawn_room(code.to_string(), kind, theme, generation, ctx.clone());
        let handle = RoomHandle {
            code: code.to_string(),
            kind,
            generation,
            tx,
        };
        self.rooms.insert(code.to_string(), handle.clone());
        tracing::info!(room = code, kind = %kind, "Room created");
        handle
    }

    /// Called by an exiting actor. A newer room under the same code is left
    /// alone.
    pub fn remove_if_current(&mut self, code: &str, generation: u64) {
        if self
            .rooms
            .get(code)
            .is_some_and(|h| h.generation == generation)
        {
            self.rooms.remove(code);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.values().filter(|h| !h.is_closed()).count()
    }

    /// Ask every room to stop; used on server shutdown.
    pub fn shutdown_all(&self) {
        for handle in self.rooms.values() {
            handle.shutdown();
        }
    }
}
