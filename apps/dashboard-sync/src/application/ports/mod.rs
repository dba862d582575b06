//! Port Interfaces
//!
//! Contracts between the synchronization core and its external
//! collaborators, following the hexagonal layout:
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Transport`] / [`TransportConnection`]: the push channel. The lifecycle
//!   manager only ever sees these traits, so it can be driven by a fake
//!   in-memory transport in tests instead of a real socket.
//! - [`PullApi`]: the REST-style pull channel. Consumed at this boundary
//!   only; the HTTP layer, its retries and interceptors live outside this
//!   crate.
//!
//! ## Session Boundary
//!
//! - [`SessionBoundary`]: supplies the credential token for the connection
//!   target and is notified when the server rejects authentication, so the
//!   owning shell can invalidate the session. This is the only error that
//!   crosses out of the core.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::market::{
    ClosePositionRequest, OpenPositionRequest, PortfolioSnapshot, Position, PositionStatus,
    Symbol, Trade,
};

// =============================================================================
// Push Transport
// =============================================================================

/// Errors surfaced by the push transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Server refused the connection because the session token is missing or
    /// invalid. Terminal for the connection attempt; never retried.
    #[error("authentication rejected by server")]
    AuthRejected,

    /// The connection could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Socket-level failure on an established connection.
    #[error("transport failure: {0}")]
    Io(String),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// Factory for push-channel connections. One logical connection at a time is
/// enforced by the lifecycle manager, not by implementations.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Concrete connection type produced by this transport.
    type Conn: TransportConnection;

    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// `AuthRejected` when the server refuses the credential embedded in the
    /// target; `ConnectFailed` for any other establishment failure.
    async fn connect(&self, url: &str) -> Result<Self::Conn, TransportError>;
}

/// A shared transport is itself a transport.
#[async_trait]
impl<T: Transport> Transport for std::sync::Arc<T> {
    type Conn = T::Conn;

    async fn connect(&self, url: &str) -> Result<Self::Conn, TransportError> {
        (**self).connect(url).await
    }
}

/// An established push-channel connection.
#[async_trait]
pub trait TransportConnection: Send {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// `Io`/`Closed` when the socket is no longer writable. In-flight sends
    /// may fail silently once the transport is closing.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Receive the next text frame, in arrival order.
    ///
    /// Returns `None` when the connection has ended cleanly and `Some(Err)`
    /// on socket failure. Control frames handled by the underlying protocol
    /// are not surfaced.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

// =============================================================================
// Session Boundary
// =============================================================================

/// Supplies the credential token and receives authentication rejections.
pub trait SessionBoundary: Send + Sync + 'static {
    /// Current session token, or `None` when no session is active.
    fn token(&self) -> Option<String>;

    /// Invoked when the server rejects authentication. Implementations
    /// invalidate the session; the core never retries with the same token.
    fn on_auth_rejected(&self);
}

/// Trivial [`SessionBoundary`] holding a fixed token, suitable for the
/// binary and for tests. Flips an invalidated flag on rejection.
#[derive(Debug)]
pub struct StaticSession {
    token: Option<String>,
    invalidated: AtomicBool,
}

impl StaticSession {
    /// Create a session with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Create a session with no token, e.g. before login.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            token: None,
            invalidated: AtomicBool::new(false),
        }
    }

    /// Whether the server has rejected this session.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }
}

impl SessionBoundary for StaticSession {
    fn token(&self) -> Option<String> {
        if self.is_invalidated() {
            return None;
        }
        self.token.clone()
    }

    fn on_auth_rejected(&self) {
        tracing::warn!("session token rejected by server");
        self.invalidated.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Pull Channel
// =============================================================================

/// Errors surfaced by the pull channel collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PullApiError {
    /// The session expired; mirrored to the session boundary by the caller.
    #[error("unauthorized")]
    Unauthorized,

    /// Any other request failure, already shaped for logging.
    #[error("request failed: {0}")]
    Request(String),
}

/// REST-style pull channel, consumed but not implemented by this crate.
///
/// Responses are shaped like the domain types and may be stale relative to
/// the push channel; callers reconcile them through the
/// [`ReconciliationStore`](crate::ReconciliationStore).
#[async_trait]
pub trait PullApi: Send + Sync + 'static {
    /// Fetch the current portfolio snapshot.
    async fn fetch_portfolio(&self) -> Result<PortfolioSnapshot, PullApiError>;

    /// Fetch positions, optionally filtered by status.
    async fn fetch_positions(
        &self,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, PullApiError>;

    /// Open a new position.
    async fn open_position(&self, request: OpenPositionRequest) -> Result<Position, PullApiError>;

    /// Close a position by id.
    async fn close_position(
        &self,
        id: uuid::Uuid,
        request: ClosePositionRequest,
    ) -> Result<Position, PullApiError>;

    /// List trade history with pagination.
    async fn fetch_trades(&self, skip: usize, limit: usize) -> Result<Vec<Trade>, PullApiError>;

    /// Fetch the latest known tick for one symbol, when the backend offers a
    /// REST quote endpoint. Default implementations may not support this.
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<crate::PriceTick>, PullApiError> {
        let _ = symbol;
        Ok(None)
    }
}
