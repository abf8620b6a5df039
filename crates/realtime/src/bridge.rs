//! Live notification bridge
//!
//! Keeps one live connection for the signed-in user, feeds incoming events
//! through the [`DispatchTable`] and reconnects with a linear backoff after
//! transient failures. Outbound messages are only sent while connected.

use crate::cache::{CacheInvalidator, CacheKey, QueryCache};
use crate::dispatch::{DispatchTable, HandlerContext};
use crate::event::Envelope;
use crate::notifications::NotificationCenter;
use crate::transport::{LiveConnection, LiveTransport};
use serde_json::Value;
use skillverse_core::Settings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

/// Bridge connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `attempt`
    Reconnecting { attempt: u32 },
    /// Torn down by the owner
    Disconnected,
    /// Gave up after the configured number of attempts
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Reconnect attempts after the connection drops or cannot be opened
    pub reconnect_attempts: u32,
    /// Attempt `n` waits `n * reconnect_delay`
    pub reconnect_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl BridgeConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            reconnect_attempts: settings.realtime.reconnect_attempts,
            reconnect_delay: settings.reconnect_delay(),
        }
    }
}

/// Builder for [`RealtimeBridge`]
pub struct RealtimeBridgeBuilder {
    transport: Arc<dyn LiveTransport>,
    cache: Option<Arc<dyn CacheInvalidator>>,
    notifications: Option<Arc<NotificationCenter>>,
    dispatch: Option<DispatchTable>,
    config: BridgeConfig,
}

impl RealtimeBridgeBuilder {
    pub fn new(transport: Arc<dyn LiveTransport>) -> Self {
        Self {
            transport,
            cache: None,
            notifications: None,
            dispatch: None,
            config: BridgeConfig::default(),
        }
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn notifications(mut self, notifications: Arc<NotificationCenter>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Replace the standard handlers
    #[must_use]
    pub fn dispatch(mut self, dispatch: DispatchTable) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    #[must_use]
    pub const fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RealtimeBridge {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        RealtimeBridge {
            shared: Arc::new(Shared {
                transport: self.transport,
                cache: self
                    .cache
                    .unwrap_or_else(|| Arc::new(QueryCache::new())),
                notifications: self.notifications.unwrap_or_default(),
                dispatch: self.dispatch.unwrap_or_else(DispatchTable::standard),
                config: self.config,
                state_tx,
                generation: AtomicU64::new(0),
            }),
            active: Mutex::new(None),
        }
    }
}

struct Shared {
    transport: Arc<dyn LiveTransport>,
    cache: Arc<dyn CacheInvalidator>,
    notifications: Arc<NotificationCenter>,
    dispatch: DispatchTable,
    config: BridgeConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// Bumped on every connect and disconnect; stale sessions stop publishing
    generation: AtomicU64,
}

struct ActiveSession {
    user_id: String,
    shutdown_tx: watch::Sender<bool>,
    outbound_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl ActiveSession {
    fn stop(self) {
        // The task closes the connection itself; it may already have ended
        let _ = self.shutdown_tx.send(true);
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Handle returned by [`RealtimeBridge::connect`]
#[derive(Debug, Clone)]
pub struct Connection {
    user_id: String,
    state_rx: watch::Receiver<ConnectionState>,
}

impl Connection {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Wait until the bridge is connected; false if it failed or was torn down first
    pub async fn wait_connected(&mut self) -> bool {
        self.state_rx
            .wait_for(|state| {
                matches!(
                    state,
                    ConnectionState::Connected
                        | ConnectionState::Failed(_)
                        | ConnectionState::Disconnected
                )
            })
            .await
            .is_ok_and(|state| *state == ConnectionState::Connected)
    }
}

/// Live event bridge for one user at a time
pub struct RealtimeBridge {
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveSession>>,
}

impl RealtimeBridge {
    pub fn builder(transport: Arc<dyn LiveTransport>) -> RealtimeBridgeBuilder {
        RealtimeBridgeBuilder::new(transport)
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the live channel for `user_id`
    ///
    /// Does nothing and returns `None` without a user. Connecting as the user
    /// of a running session returns a handle to that session; connecting as
    /// another user replaces it. Must be called within a tokio runtime.
    pub fn connect(&self, user_id: Option<&str>) -> Option<Connection> {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            debug!("No user, live channel not opened");
            return None;
        };

        let mut active = self.active();
        let running = active
            .as_ref()
            .is_some_and(|session| session.user_id == user_id && !session.task.is_finished());
        if running {
            return Some(self.handle(user_id));
        }
        if let Some(previous) = active.take() {
            info!(user_id = %previous.user_id, "Replacing live session");
            previous.stop();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.publish(generation, ConnectionState::Connecting);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("live_session", user_id = %user_id, generation);
        let shared = Arc::clone(&self.shared);
        let owned_user = user_id.to_string();
        let task = tokio::spawn(
            async move {
                shared
                    .run_session(owned_user, generation, shutdown_rx, outbound_rx)
                    .await;
            }
            .instrument(span),
        );

        *active = Some(ActiveSession {
            user_id: user_id.to_string(),
            shutdown_tx,
            outbound_tx,
            task,
        });
        Some(self.handle(user_id))
    }

    fn handle(&self, user_id: &str) -> Connection {
        Connection {
            user_id: user_id.to_string(),
            state_rx: self.shared.state_tx.subscribe(),
        }
    }

    /// Tear down the live channel; calling it again is a no-op
    pub fn disconnect(&self) {
        let Some(session) = self.active().take() else {
            return;
        };
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        info!(user_id = %session.user_id, "Live channel disconnected");
        session.stop();
        self.shared.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Send an event if connected; otherwise the message is dropped
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        if !self.is_connected() {
            debug!(event, "Not connected, dropping outbound event");
            return false;
        }
        let text = match Envelope::new(event, payload).to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(event, "Failed to encode outbound event: {}", e);
                return false;
            }
        };
        self.active()
            .as_ref()
            .is_some_and(|session| session.outbound_tx.send(text).is_ok())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.state_tx.borrow() == ConnectionState::Connected
    }

    /// User of the current session, if any
    pub fn current_user(&self) -> Option<String> {
        self.active().as_ref().map(|session| session.user_id.clone())
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.shared.notifications
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Shared {
    /// Publish `state` unless a newer session or a disconnect superseded `generation`
    fn publish(&self, generation: u64, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    async fn run_session(
        &self,
        user_id: String,
        generation: u64,
        mut shutdown_rx: watch::Receiver<bool>,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) {
        let mut attempts: u32 = 0;
        let mut connected_before = false;

        loop {
            let result = tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = self.transport.connect(&user_id) => result,
            };

            match result {
                Ok(mut conn) => {
                    // Anything queued before this connection is stale
                    while outbound_rx.try_recv().is_ok() {}

                    self.publish(generation, ConnectionState::Connected);
                    info!("Live channel connected");
                    if connected_before {
                        self.catch_up(&user_id);
                    }
                    connected_before = true;
                    attempts = 0;

                    match self
                        .pump(&user_id, conn.as_mut(), &mut shutdown_rx, &mut outbound_rx)
                        .await
                    {
                        SessionEnd::Shutdown => {
                            conn.close().await;
                            break;
                        }
                        SessionEnd::Lost(reason) => warn!("Live channel lost: {}", reason),
                    }
                }
                Err(e) => warn!("Live channel connect failed: {}", e),
            }

            attempts += 1;
            if attempts > self.config.reconnect_attempts {
                error!(attempts = attempts - 1, "Giving up on live channel");
                self.publish(
                    generation,
                    ConnectionState::Failed(format!(
                        "no connection after {} reconnect attempts",
                        self.config.reconnect_attempts
                    )),
                );
                break;
            }

            self.publish(generation, ConnectionState::Reconnecting { attempt: attempts });
            let backoff = self.config.reconnect_delay.saturating_mul(attempts);
            info!(
                "Reconnecting in {:?} (attempt {} of {})",
                backoff, attempts, self.config.reconnect_attempts
            );
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                () = tokio::time::sleep(backoff) => {}
            }
        }

        debug!("Live session ended");
    }

    async fn pump(
        &self,
        user_id: &str,
        conn: &mut dyn LiveConnection,
        shutdown_rx: &mut watch::Receiver<bool>,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => return SessionEnd::Shutdown,
                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = conn.send(text).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                message = conn.next_message() => match message {
                    Some(Ok(text)) => self.handle_message(user_id, &text),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by server".to_string()),
                },
            }
        }
    }

    fn handle_message(&self, user_id: &str, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring malformed live frame: {}", e);
                return;
            }
        };

        let ctx = HandlerContext {
            user_id,
            cache: self.cache.as_ref(),
            notifications: &self.notifications,
        };
        match self.dispatch.dispatch(&ctx, &envelope) {
            Ok(true) => debug!(event = %envelope.event, "Live event handled"),
            Ok(false) => {}
            Err(e) => warn!(event = %envelope.event, "Live event handler failed: {}", e),
        }
    }

    /// Events sent while disconnected are not replayed; mark everything the
    /// user could have missed stale instead
    fn catch_up(&self, user_id: &str) {
        debug!("Invalidating user scopes after reconnect");
        for scope in CacheKey::user_scopes(user_id) {
            self.cache.invalidate(&scope);
        }
        self.cache.invalidate(&CacheKey::trends());
    }
}
