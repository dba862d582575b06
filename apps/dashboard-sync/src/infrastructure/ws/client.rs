//! Connection Lifecycle Manager
//!
//! Owns the single logical push connection and drives the state machine
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Reconnecting ──┐
//!        ▲              │              │              │        │
//!        │              └──────────────┴──► Closed ◄──┘        │
//!        └─────────────────────────────────────────────────────┘
//! ```
//!
//! `Closed` is terminal: it is reached by explicit shutdown, by exhausting
//! the reconnect budget, or by an authentication rejection (which also
//! notifies the session boundary and never enters the reconnect loop).
//!
//! The whole lifecycle runs in one task ([`SyncClient::run`]): one
//! connection, one message-handling path, frames applied to the store in
//! arrival order. The reconnect sleep inside that loop is the only reconnect
//! timer that can ever exist, so at most one is pending at any instant, and
//! cancelling the task cancels the timer.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::codec::{FrameCodec, Inbound, Outbound};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{
    SessionBoundary, Transport, TransportConnection, TransportError,
};
use crate::domain::reconcile::{BoardView, ReconciliationStore};
use crate::domain::subscription::SubscriptionSet;

// =============================================================================
// Connection State
// =============================================================================

/// State of the single logical push connection.
///
/// Mutated only by the lifecycle manager; observed by consumers through the
/// watch channel returned by [`SyncHandle::state_changes`]. This is the only
/// connectivity signal surfaced to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and none being attempted yet.
    #[default]
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open and authenticated; sends are valid.
    Connected,
    /// Connection lost; exactly one reconnect timer pending.
    Reconnecting,
    /// Terminal. No further automatic reconnects.
    Closed,
}

impl ConnectionState {
    /// Whether subscribe/unsubscribe frames may be sent right now.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Lifecycle errors that cross out of the run loop.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A send was attempted outside Connected. Non-fatal: the change stays
    /// in the desired set and the next resync re-derives it.
    #[error("not connected")]
    NotConnected,

    /// The reconnect budget was exhausted.
    #[error("maximum reconnection attempts exceeded")]
    ReconnectExhausted,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the sync client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the push endpoint, e.g. `ws://localhost:8000`.
    pub ws_base_url: String,
    /// Reconnection delay policy.
    pub reconnect: ReconnectConfig,
    /// Capacity of the handle→loop command channel.
    pub command_capacity: usize,
}

impl SyncConfig {
    /// Create a configuration with default reconnect policy.
    #[must_use]
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            reconnect: ReconnectConfig::default(),
            command_capacity: 16,
        }
    }

    /// Connection target with the session token embedded.
    #[must_use]
    pub fn target_url(&self, token: &str) -> String {
        format!(
            "{}/ws?session_id={token}",
            self.ws_base_url.trim_end_matches('/')
        )
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Commands from handles into the run loop.
#[derive(Debug)]
enum Command {
    /// Re-derive the subscription diff and send it if connected.
    Resync,
}

/// Cloneable handle to a running [`SyncClient`].
///
/// External code interacts with the sync core exclusively through this
/// handle; the subscription set and the store are never exposed for direct
/// mutation.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    subscriptions: Arc<RwLock<SubscriptionSet>>,
    store: Arc<ReconciliationStore>,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl SyncHandle {
    /// Add symbols to the desired set.
    ///
    /// Sends immediately only while Connected; otherwise the change is
    /// retained in the desired set and applied by the resync on the next
    /// successful connect.
    pub fn subscribe<I>(&self, symbols: I)
    where
        I: IntoIterator<Item = String>,
    {
        let changed = self.subscriptions.write().subscribe(symbols);
        if changed {
            self.request_resync();
        }
    }

    /// Remove symbols from the desired set. Same send semantics as
    /// [`subscribe`](Self::subscribe).
    pub fn unsubscribe<'a, I>(&self, symbols: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let changed = self.subscriptions.write().unsubscribe(symbols);
        if changed {
            self.request_resync();
        }
    }

    fn request_resync(&self) {
        if self.state_rx.borrow().is_connected() {
            // Lossy by design: the loop re-derives the diff from `desired`,
            // so a dropped command never loses intent.
            let _ = self.cmd_tx.try_send(Command::Resync);
        } else {
            tracing::debug!(
                error = %SyncError::NotConnected,
                "send dropped; subscription change retained in desired set"
            );
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel for state transitions (the connectivity indicator).
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The shared reconciliation store, for pull refreshers and views.
    #[must_use]
    pub fn store(&self) -> Arc<ReconciliationStore> {
        Arc::clone(&self.store)
    }

    /// Read the reconciled state.
    #[must_use]
    pub fn read(&self) -> BoardView {
        self.store.read()
    }

    /// Copy of the subscription bookkeeping, for inspection.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionSet {
        self.subscriptions.read().clone()
    }

    /// Tear the connection down.
    ///
    /// Cancels any pending reconnect timer, closes the transport and drives
    /// the state machine to Closed. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Client
// =============================================================================

/// Outcome of one established connection.
enum Driven {
    Cancelled,
    ConnectionLost(TransportError),
}

/// The connection lifecycle manager.
///
/// Generic over the [`Transport`] port so tests can drive it with a fake
/// in-memory transport instead of a real socket.
pub struct SyncClient<T: Transport, S: SessionBoundary> {
    config: SyncConfig,
    transport: T,
    session: Arc<S>,
    codec: FrameCodec,
    store: Arc<ReconciliationStore>,
    subscriptions: Arc<RwLock<SubscriptionSet>>,
    state_tx: watch::Sender<ConnectionState>,
    cmd_rx: mpsc::Receiver<Command>,
    cmd_open: bool,
    cancel: CancellationToken,
}

impl<T: Transport, S: SessionBoundary> SyncClient<T, S> {
    /// Create a client and its handle. The client does nothing until
    /// [`run`](Self::run) is awaited (typically in a spawned task).
    #[must_use]
    pub fn new(config: SyncConfig, transport: T, session: Arc<S>) -> (Self, SyncHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let store = Arc::new(ReconciliationStore::new());
        let subscriptions = Arc::new(RwLock::new(SubscriptionSet::new()));
        let cancel = CancellationToken::new();

        let handle = SyncHandle {
            subscriptions: Arc::clone(&subscriptions),
            store: Arc::clone(&store),
            cmd_tx,
            state_rx,
            cancel: cancel.clone(),
        };

        let client = Self {
            config,
            transport,
            session,
            codec: FrameCodec::new(),
            store,
            subscriptions,
            state_tx,
            cmd_rx,
            cmd_open: true,
            cancel,
        };

        (client, handle)
    }

    /// Run the connection lifecycle until shutdown, auth rejection, or an
    /// exhausted reconnect budget.
    ///
    /// Consuming `self` makes concurrent connections unrepresentable: there
    /// is exactly one loop, one connection, and one pending reconnect timer
    /// at most.
    ///
    /// # Errors
    ///
    /// [`SyncError::ReconnectExhausted`] when the policy gives up. Shutdown
    /// and auth rejection are normal terminations.
    pub async fn run(mut self) -> Result<(), SyncError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }

            // Silently retrying with no valid token would surface no
            // progress to the user; close and notify instead.
            let Some(token) = self.session.token() else {
                tracing::warn!("no session token available");
                self.set_state(ConnectionState::Closed);
                self.session.on_auth_rejected();
                return Ok(());
            };

            self.set_state(ConnectionState::Connecting);
            let url = self.config.target_url(&token);
            tracing::info!(url = %self.config.ws_base_url, "connecting to push channel");

            let connect_result = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closed);
                    return Ok(());
                }
                result = self.transport.connect(&url) => result,
            };

            match connect_result {
                Ok(mut conn) => {
                    self.set_state(ConnectionState::Connected);
                    policy.reset();

                    let outcome = match self.resync(&mut conn).await {
                        Ok(()) => self.drive(&mut conn).await,
                        Err(e) => Driven::ConnectionLost(e),
                    };

                    // Leaving Connected always invalidates what the server
                    // was told to stream.
                    self.subscriptions.write().reset_confirmed();

                    match outcome {
                        Driven::Cancelled => {
                            conn.close().await;
                            self.set_state(ConnectionState::Closed);
                            return Ok(());
                        }
                        Driven::ConnectionLost(e) => {
                            tracing::warn!(error = %e, "push connection lost");
                        }
                    }
                }
                Err(TransportError::AuthRejected) => {
                    self.set_state(ConnectionState::Closed);
                    self.session.on_auth_rejected();
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "connect failed");
                }
            }

            let Some(delay) = policy.next_delay() else {
                tracing::error!("reconnect budget exhausted");
                self.set_state(ConnectionState::Closed);
                return Err(SyncError::ReconnectExhausted);
            };

            self.set_state(ConnectionState::Reconnecting);
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling reconnect"
            );

            if !self.wait_for_reconnect(delay).await {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }
        }
    }

    /// Sleep out the single pending reconnect timer.
    ///
    /// Returns `false` if shutdown cancelled the timer. Subscription
    /// commands arriving meanwhile are drained and dropped; their intent is
    /// already in the desired set.
    async fn wait_for_reconnect(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                () = &mut sleep => return true,
                cmd = self.cmd_rx.recv(), if self.cmd_open => {
                    match cmd {
                        Some(_) => tracing::debug!(
                            error = %SyncError::NotConnected,
                            "send dropped while reconnecting"
                        ),
                        None => self.cmd_open = false,
                    }
                }
            }
        }
    }

    /// Process one established connection until it fails or shutdown.
    async fn drive(&mut self, conn: &mut T::Conn) -> Driven {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Driven::Cancelled,
                cmd = self.cmd_rx.recv(), if self.cmd_open => {
                    match cmd {
                        Some(Command::Resync) => {
                            if let Err(e) = self.resync(conn).await {
                                return Driven::ConnectionLost(e);
                            }
                        }
                        None => self.cmd_open = false,
                    }
                }
                frame = conn.next_frame() => {
                    match frame {
                        Some(Ok(text)) => {
                            if let Err(e) = self.handle_frame(conn, &text).await {
                                return Driven::ConnectionLost(e);
                            }
                        }
                        Some(Err(e)) => return Driven::ConnectionLost(e),
                        None => return Driven::ConnectionLost(TransportError::Closed),
                    }
                }
            }
        }
    }

    /// Apply one inbound frame.
    ///
    /// Decode failures are contained here: logged and dropped, never fatal.
    /// Only a failed pong send escapes, as a transport failure.
    async fn handle_frame(
        &mut self,
        conn: &mut T::Conn,
        text: &str,
    ) -> Result<(), TransportError> {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return Ok(());
            }
        };

        match message {
            // The server treats a missed pong as a dead connection; reply
            // before any later queued frame is processed.
            Inbound::Ping => self.send_message(conn, &Outbound::Pong).await?,
            Inbound::PriceUpdate(tick) => {
                tracing::trace!(symbol = %tick.symbol, "price tick");
                self.store.apply_push_price(tick);
            }
            Inbound::PortfolioSnapshot(snapshot) | Inbound::PnlUpdate(snapshot) => {
                tracing::trace!(
                    positions = snapshot.positions.len(),
                    "portfolio snapshot"
                );
                self.store.apply_push_portfolio(snapshot);
            }
        }

        Ok(())
    }

    /// Bring the server in line with the desired set.
    ///
    /// Computes `desired − confirmed` / `confirmed − desired` and sends at
    /// most one subscribe and one unsubscribe frame. On a fresh connection
    /// this degenerates to the entire desired set in a single subscribe.
    /// `confirmed` advances only after the frames have actually been sent.
    async fn resync(&mut self, conn: &mut T::Conn) -> Result<(), TransportError> {
        let changes = self.subscriptions.read().diff();
        if changes.is_empty() {
            return Ok(());
        }

        if !changes.subscribe.is_empty() {
            self.send_message(
                conn,
                &Outbound::Subscribe {
                    symbols: changes.subscribe.clone(),
                },
            )
            .await?;
        }

        if !changes.unsubscribe.is_empty() {
            self.send_message(
                conn,
                &Outbound::Unsubscribe {
                    symbols: changes.unsubscribe.clone(),
                },
            )
            .await?;
        }

        self.subscriptions.write().mark_sent(&changes);
        tracing::debug!(
            subscribed = changes.subscribe.len(),
            unsubscribed = changes.unsubscribe.len(),
            "subscriptions resynced"
        );

        Ok(())
    }

    async fn send_message(
        &self,
        conn: &mut T::Conn,
        message: &Outbound,
    ) -> Result<(), TransportError> {
        match self.codec.encode(message) {
            Ok(frame) => conn.send(frame).await,
            Err(e) => {
                // Encoding a control message cannot realistically fail;
                // treat it like a malformed frame rather than a dead socket.
                tracing::error!(error = %e, "failed to encode outbound message");
                Ok(())
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::info!(from = previous.as_str(), to = state.as_str(), "state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_url_embeds_session_token() {
        let config = SyncConfig::new("ws://localhost:8000");
        assert_eq!(
            config.target_url("T1"),
            "ws://localhost:8000/ws?session_id=T1"
        );
    }

    #[test]
    fn target_url_tolerates_trailing_slash() {
        let config = SyncConfig::new("ws://localhost:8000/");
        assert_eq!(
            config.target_url("abc"),
            "ws://localhost:8000/ws?session_id=abc"
        );
    }

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(ConnectionState::Connected.is_connected());
    }
}
