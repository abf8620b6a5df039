//! Live channel transports
//!
//! [`WebSocketTransport`] talks to the backend. [`ChannelTransport`] is an
//! in-process stand-in whose [`ChannelServer`] half pushes events and drops
//! connections on demand.

use crate::error::{RealtimeError, Result};
use crate::event::Envelope;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

/// Opens live connections
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Open a connection identified by `user_id`
    async fn connect(&self, user_id: &str) -> Result<Box<dyn LiveConnection>>;
}

/// One open live connection
#[async_trait]
pub trait LiveConnection: Send {
    /// Next text frame; `None` once the peer closed the connection
    async fn next_message(&mut self) -> Option<Result<String>>;

    async fn send(&mut self, text: String) -> Result<()>;

    async fn close(&mut self);
}

/// WebSocket transport; the user id travels as the `userId` query parameter
pub struct WebSocketTransport {
    endpoint: url::Url,
}

impl WebSocketTransport {
    /// `origin` may use http(s) or ws(s); `path` is appended to it
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidUrl`] when the origin does not parse
    /// or uses another scheme
    pub fn new(origin: &str, path: &str) -> Result<Self> {
        let mut endpoint = url::Url::parse(origin)
            .and_then(|base| base.join(path))
            .map_err(|e| RealtimeError::InvalidUrl(format!("{origin}{path}: {e}")))?;

        let scheme = match endpoint.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(RealtimeError::InvalidUrl(format!(
                    "unsupported scheme '{other}'"
                )));
            }
        };
        endpoint
            .set_scheme(scheme)
            .map_err(|()| RealtimeError::InvalidUrl(format!("cannot use scheme '{scheme}'")))?;

        Ok(Self { endpoint })
    }

    /// Handshake URL for `user_id`
    pub fn endpoint_for(&self, user_id: &str) -> url::Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("userId", user_id);
        url
    }
}

#[async_trait]
impl LiveTransport for WebSocketTransport {
    async fn connect(&self, user_id: &str) -> Result<Box<dyn LiveConnection>> {
        let url = self.endpoint_for(user_id);
        debug!(endpoint = %self.endpoint, "Opening WebSocket");
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl LiveConnection for WsConnection {
    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => warn!("Ignoring non UTF-8 binary frame: {}", e),
                },
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        error!("Failed to answer ping: {}", e);
                        return Some(Err(e.into()));
                    }
                }
                Ok(Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server closed the WebSocket");
                    return None;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RealtimeError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}

#[derive(Default)]
struct ChannelState {
    live: Mutex<Option<mpsc::UnboundedSender<String>>>,
    user: Mutex<Option<String>>,
    sent: Mutex<Vec<String>>,
    refuse: AtomicBool,
    connects: AtomicUsize,
}

impl ChannelState {
    fn live(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process transport
#[derive(Clone)]
pub struct ChannelTransport {
    state: Arc<ChannelState>,
}

/// Server side of a [`ChannelTransport`]
#[derive(Clone)]
pub struct ChannelServer {
    state: Arc<ChannelState>,
}

impl ChannelTransport {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, ChannelServer) {
        let state = Arc::new(ChannelState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            ChannelServer { state },
        )
    }
}

#[async_trait]
impl LiveTransport for ChannelTransport {
    async fn connect(&self, user_id: &str) -> Result<Box<dyn LiveConnection>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(RealtimeError::Connect("connection refused".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.live() = Some(tx);
        *self
            .state
            .user
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(user_id.to_string());

        Ok(Box::new(ChannelConnection {
            incoming: rx,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ChannelConnection {
    incoming: mpsc::UnboundedReceiver<String>,
    state: Arc<ChannelState>,
}

#[async_trait]
impl LiveConnection for ChannelConnection {
    async fn next_message(&mut self) -> Option<Result<String>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}

impl ChannelServer {
    /// Push an event to the open connection; false when none is open
    pub fn push(&self, event: &str, data: Value) -> bool {
        match Envelope::new(event, data).to_text() {
            Ok(text) => self.push_raw(text),
            Err(_) => false,
        }
    }

    pub fn push_raw(&self, text: impl Into<String>) -> bool {
        self.state
            .live()
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Drop the open connection as if the network failed
    pub fn drop_connections(&self) {
        self.state.live().take();
    }

    /// Make subsequent connection attempts fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Whether a connection is open and still being read
    pub fn is_open(&self) -> bool {
        self.state.live().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Frames the client sent
    pub fn sent(&self) -> Vec<String> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// User id of the latest connection
    pub fn connected_user(&self) -> Option<String> {
        self.state
            .user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
