use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use roletrando_core::error::ErrorCode;
use roletrando_core::net::messages::{ClientMessage, ErrorMsg, ServerMessage, WelcomeMsg};
use roletrando_core::net::protocol::{ProtocolError, decode_server_message, encode_client_message};
use roletrando_core::player::percent_encode;
use roletrando_core::room::GameKind;

use crate::view::ClientView;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a connect may take, from TCP dial to `WELCOME`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport kept failing until the reconnect budget ran out.
    #[error("connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },
    /// The room this client was bound to no longer exists.
    #[error("room session expired")]
    SessionExpired,
    #[error("rejected by the room: {}", .0.message)]
    Rejected(ErrorMsg),
    /// The server closed this socket on purpose, e.g. because the same name
    /// connected again from somewhere else.
    #[error("connection closed by the server")]
    Closed,
    #[error("no WELCOME within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("connection dropped before WELCOME")]
    HandshakeInterrupted,
    #[error("unexpected {0} before WELCOME")]
    UnexpectedMessage(&'static str),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl ClientError {
    /// Failures worth another reconnect attempt.
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::HandshakeTimeout(_) | Self::HandshakeInterrupted
        )
    }
}

/// The `?mode=` a connection asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinMode {
    Create,
    Join,
    #[default]
    Auto,
}

impl JoinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Join => "join",
            Self::Auto => "auto",
        }
    }
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            factor: 2,
            max_delay: Duration::from_secs(8),
            max_attempts: 6,
        }
    }
}

impl ReconnectPolicy {
    /// Wait before the zero-based `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Where a client connects: server base URL plus the room path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTarget {
    /// `ws://host:port` or `wss://host`, without a trailing path.
    pub base_url: String,
    pub kind: GameKind,
    pub room: String,
    pub name: String,
    pub theme: Option<String>,
}

impl RoomTarget {
    pub fn new(
        base_url: impl Into<String>,
        kind: GameKind,
        room: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            kind,
            room: room.into(),
            name: name.into(),
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn url(&self, mode: JoinMode) -> String {
        let mut url = format!(
            "{}/api/ws/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.kind,
            percent_encode(&self.room),
            percent_encode(&self.name),
        );
        if let Some(theme) = &self.theme {
            url.push('/');
            url.push_str(&percent_encode(theme));
        }
        url.push_str("?mode=");
        url.push_str(mode.as_str());
        url
    }
}

enum Incoming {
    Message(ServerMessage),
    /// The server sent a close frame.
    Closed,
    /// The transport failed or ended without a close frame.
    Dropped,
}

/// One player's connection to a room.
///
/// A dropped socket is rebound to the same seat (same name, `mode=join`)
/// with exponential backoff; callers only see the failure once the policy's
/// attempts are used up.
pub struct RoomClient {
    target: RoomTarget,
    policy: ReconnectPolicy,
    stream: WsStream,
    view: ClientView,
}

impl RoomClient {
    /// Connect and wait for `WELCOME`. The first connect is not retried.
    pub async fn connect(
        target: RoomTarget,
        mode: JoinMode,
        policy: ReconnectPolicy,
    ) -> Result<Self, ClientError> {
        let (stream, welcome) = handshake(&target.url(mode)).await?;
        tracing::info!(
            room = %welcome.room_id,
            player_id = welcome.player_id,
            reconnected = welcome.reconnected,
            "Joined room"
        );
        let mut view = ClientView::new();
        view.apply(&ServerMessage::Welcome(welcome));
        Ok(Self {
            target,
            policy,
            stream,
            view,
        })
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    pub fn target(&self) -> &RoomTarget {
        &self.target
    }

    /// Send one intent, reconnecting first if the socket is gone.
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let text = encode_client_message(msg)?;
        if let Err(e) = self.stream.send(Message::Text(text.clone().into())).await {
            tracing::debug!(error = %e, "Send failed, reconnecting");
            self.reconnect().await?;
            self.stream.send(Message::Text(text.into())).await?;
        }
        Ok(())
    }

    /// Next message from the room, already folded into [`Self::view`].
    /// Out-of-date state updates are skipped.
    pub async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            match read_frame(&mut self.stream).await? {
                Incoming::Message(ServerMessage::Error(err))
                    if err.code == ErrorCode::SessionExpired =>
                {
                    return Err(ClientError::SessionExpired);
                },
                Incoming::Message(msg) => {
                    if self.view.apply(&msg) {
                        return Ok(msg);
                    }
                },
                Incoming::Closed => return Err(ClientError::Closed),
                Incoming::Dropped => self.reconnect().await?,
            }
        }
    }

    /// Read messages until one matches `pred`.
    pub async fn wait_for(
        &mut self,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> Result<ServerMessage, ClientError> {
        loop {
            let msg = self.next_message().await?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), ClientError> {
        let url = self.target.url(JoinMode::Join);
        for attempt in 0..self.policy.max_attempts {
            let delay = self.policy.delay(attempt);
            tracing::info!(attempt = attempt + 1, ?delay, "Reconnecting");
            tokio::time::sleep(delay).await;

            match handshake(&url).await {
                Ok((stream, welcome)) => {
                    tracing::info!(
                        player_id = welcome.player_id,
                        reconnected = welcome.reconnected,
                        "Reconnected"
                    );
                    self.stream = stream;
                    self.view.apply(&ServerMessage::Welcome(welcome));
                    return Ok(());
                },
                Err(ClientError::Rejected(err)) if err.code == ErrorCode::RoomNotFound => {
                    return Err(ClientError::SessionExpired);
                },
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
                },
                Err(e) => return Err(e),
            }
        }
        Err(ClientError::ConnectionLost {
            attempts: self.policy.max_attempts,
        })
    }
}

async fn handshake(url: &str) -> Result<(WsStream, WelcomeMsg), ClientError> {
    let attempt = async {
        let (mut stream, _) = connect_async(url).await?;
        match read_frame(&mut stream).await? {
            Incoming::Message(ServerMessage::Welcome(welcome)) => Ok((stream, welcome)),
            Incoming::Message(ServerMessage::Error(err)) => {
                if err.code == ErrorCode::SessionExpired {
                    Err(ClientError::SessionExpired)
                } else {
                    Err(ClientError::Rejected(err))
                }
            },
            Incoming::Message(other) => Err(ClientError::UnexpectedMessage(
                other.message_type().as_str(),
            )),
            Incoming::Closed => Err(ClientError::Closed),
            Incoming::Dropped => Err(ClientError::HandshakeInterrupted),
        }
    };
    tokio::time::timeout(HANDSHAKE_TIMEOUT, attempt)
        .await
        .map_err(|_| ClientError::HandshakeTimeout(HANDSHAKE_TIMEOUT))?
}

async fn read_frame(stream: &mut WsStream) -> Result<Incoming, ClientError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return Ok(Incoming::Message(decode_server_message(text.as_str())?));
            },
            Some(Ok(Message::Close(_))) => return Ok(Incoming::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket read failed");
                return Ok(Incoming::Dropped);
            },
            None => return Ok(Incoming::Dropped),
        }
    }
}
