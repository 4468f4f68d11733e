use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use roletrando_core::net::messages::{ClientMessage, ServerMessage, WelcomeMsg};
use roletrando_core::net::protocol::{decode_server_message, encode_client_message};

use roletrando_server::build_app;
use roletrando_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default settings.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, kind: &str, room: &str, name: &str) -> String {
        format!("ws://{}/api/ws/{kind}/{room}/{name}", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Connect and consume the `WELCOME` frame.
pub async fn ws_join(url: &str) -> (WsStream, WelcomeMsg) {
    let mut stream = ws_connect(url).await;
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::Welcome(welcome) => (stream, welcome),
        other => panic!("Expected WELCOME, got: {other:?}"),
    }
}

/// Send a client message as a JSON text frame.
pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Send a raw text frame.
pub async fn ws_send_text(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.into())).await.unwrap();
}

/// Read the next server message (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_message(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for a server message")
}

/// Skip messages until one matches `pred` (5s timeout per message).
pub async fn ws_wait_for(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// Whether the server closes the socket within 5s.
pub async fn ws_expect_close(stream: &mut WsStream) -> bool {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(false)
}

/// Try to read a message, returning `None` if nothing arrives in `ms`.
pub async fn ws_try_read(stream: &mut WsStream, ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_message(text.as_str()).ok(),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
