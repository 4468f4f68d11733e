use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roletrando_core::error::RoomError;
use roletrando_core::game_trait::PlayerId;
use roletrando_core::net::messages::ServerMessage;
use roletrando_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, encode_server_message,
};
use roletrando_core::player::sanitize_name;
use roletrando_core::room::{GameKind, normalize_room_code};

use crate::content::is_valid_theme_name;
use crate::registry::{ConnId, ConnSender, Outbound};
use crate::room_actor::Joined;
use crate::room_manager::{JoinMode, RoomHandle};
use crate::state::{AppState, ConnectionGuard};

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub mode: JoinMode,
}

/// `GET /api/ws/{gameKind}/{roomId}/{playerName}`
pub async fn ws_handler(
    State(state): State<AppState>,
    Path((kind, room, name)): Path<(String, String, String)>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, ConnectRequest {
        kind,
        room,
        name,
        theme: None,
        mode: query.mode,
    })
}

/// `GET /api/ws/{gameKind}/{roomId}/{playerName}/{theme}`
pub async fn ws_handler_with_theme(
    State(state): State<AppState>,
    Path((kind, room, name, theme)): Path<(String, String, String, String)>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, ConnectRequest {
        kind,
        room,
        name,
        theme: Some(theme),
        mode: query.mode,
    })
}

fn upgrade(state: AppState, ws: WebSocketUpgrade, request: ConnectRequest) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, request))
}

/// Raw path and query parameters of a connection attempt.
#[derive(Debug, Clone)]
struct ConnectRequest {
    kind: String,
    room: String,
    name: String,
    theme: Option<String>,
    mode: JoinMode,
}

/// A connection attempt that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    kind: GameKind,
    room: String,
    name: String,
    theme: Option<String>,
    mode: JoinMode,
}

impl ConnectRequest {
    fn validate(self) -> Result<Target, RoomError> {
        let kind = GameKind::from_str_opt(&self.kind)
            .ok_or_else(|| RoomError::invalid(format!("unknown game kind '{}'", self.kind)))?;
        let room = normalize_room_code(&self.room)
            .ok_or_else(|| RoomError::invalid("room code must be 4 letters or digits"))?;
        let name = sanitize_name(&self.name)
            .ok_or_else(|| RoomError::invalid("player name must be 1 to 32 characters"))?;
        let theme = match self.theme {
            Some(theme) if !is_valid_theme_name(&theme) => {
                return Err(RoomError::invalid("invalid theme name"));
            },
            theme => theme,
        };
        Ok(Target {
            kind,
            room,
            name,
            theme,
            mode: self.mode,
        })
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, request: ConnectRequest) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Outbound>(state.config.limits.player_message_buffer.max(1));
    let writer = spawn_writer(ws_sender, rx);
    let conn_id = state.next_conn_id();

    let joined = match request.validate() {
        Ok(target) => attempt_join(&state, &target, conn_id, &tx).await,
        Err(err) => Err(err),
    };
    let (handle, joined) = match joined {
        Ok(ok) => ok,
        Err(err) => {
            tracing::debug!(conn_id, error = %err, "Connection rejected");
            send_direct(&tx, &ServerMessage::error(&err));
            let _ = tx.try_send(Outbound::Close);
            drop(tx);
            let _ = writer.await;
            return;
        },
    };

    read_loop(&mut ws_receiver, &state, &handle, joined.player_id, conn_id, &tx).await;

    handle.disconnect(joined.player_id, conn_id).await;
    tracing::debug!(
        player_id = joined.player_id,
        room = %handle.code,
        conn_id,
        "Socket closed"
    );
}

/// Open or create the room and bind this connection in it. A room that
/// stopped between lookup and connect is retried once, which creates a
/// fresh room unless the mode forbids it.
async fn attempt_join(
    state: &AppState,
    target: &Target,
    conn_id: ConnId,
    tx: &ConnSender,
) -> Result<(RoomHandle, Joined), RoomError> {
    let mut retried = false;
    loop {
        let handle = state.rooms.write().await.open(
            &target.room,
            target.kind,
            target.theme.as_deref(),
            target.mode,
            state.room_context(),
        )?;
        match handle
            .connect(target.name.clone(), conn_id, tx.clone())
            .await
        {
            Err(RoomError::SessionExpired) if !retried => retried = true,
            result => return result.map(|joined| (handle, joined)),
        }
    }
}

/// Forwards queued frames to the socket. Exits on `Close`, on a send
/// failure, or once every sender is gone.
fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                },
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                },
            }
        }
    })
}

fn send_direct(tx: &ConnSender, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(json) => {
            let _ = tx.try_send(Outbound::Frame(json.into()));
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode server message"),
    }
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    handle: &RoomHandle,
    player_id: PlayerId,
    conn_id: ConnId,
    tx: &ConnSender,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(_) => {
                tracing::debug!(player_id, room = %handle.code, "Dropping binary frame");
                continue;
            },
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, room = %handle.code, "Rate limited");
            continue;
        }

        if text.len() > MAX_MESSAGE_SIZE {
            tracing::warn!(
                player_id,
                room = %handle.code,
                len = text.len(),
                "Dropping oversized frame"
            );
            continue;
        }

        let message = match decode_client_message(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(player_id, room = %handle.code, error = %e, "Undecodable intent");
                send_direct(tx, &ServerMessage::error(&e.into()));
                continue;
            },
        };

        if handle
            .send_message(player_id, conn_id, message)
            .await
            .is_err()
        {
            tracing::info!(player_id, room = %handle.code, "Room is gone, closing socket");
            send_direct(tx, &ServerMessage::error(&RoomError::SessionExpired));
            let _ = tx.try_send(Outbound::Close);
            break;
        }
    }
}
