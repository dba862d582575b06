#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)
)]

//! Dashboard Sync - Real-Time Client Synchronization Layer
//!
//! Keeps the trading dashboard's view of market prices and portfolio state
//! consistent between two competing data sources:
//!
//! - **Push channel**: a persistent WebSocket connection delivering price
//!   ticks and portfolio snapshots as the server produces them.
//! - **Pull channel**: REST-style request/response fetches issued on demand
//!   or on a timer by the application shell.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and merge rules
//!   - `market`: Price ticks, portfolio snapshots, positions, trades
//!   - `subscription`: Desired vs confirmed symbol set tracking
//!   - `reconcile`: Push/pull reconciliation store
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport, session boundary, and pull-channel interfaces
//!   - `services`: Pull refresh orchestration
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `ws`: WebSocket codec, reconnect policy, lifecycle manager, transport
//!   - `config`: Environment-driven settings
//!
//! # Data Flow
//!
//! ```text
//! Session token ──► SyncClient ──► WebSocket ──► Codec ──► ReconciliationStore
//!                       ▲                                        ▲      │
//!                  SyncHandle                              PullRefresher │
//!               (subscribe/state)                          (REST fetches)▼
//!                                                              read() by views
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types and merge rules.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{
    ClosePositionRequest, OpenPositionRequest, PortfolioSnapshot, Position, PositionStatus,
    PositionType, PriceTick, Symbol, Trade,
};
pub use domain::reconcile::{BoardView, ReconciliationStore, Source};
pub use domain::subscription::{SubscriptionChanges, SubscriptionSet};

// Application ports and services
pub use application::ports::{
    PullApi, PullApiError, SessionBoundary, StaticSession, Transport, TransportConnection,
    TransportError,
};
pub use application::services::PullRefresher;

// Infrastructure
pub use infrastructure::config::{ConfigError, SyncSettings, DEFAULT_SYMBOLS};
pub use infrastructure::ws::client::{
    ConnectionState, SyncClient, SyncConfig, SyncError, SyncHandle,
};
pub use infrastructure::ws::codec::{CodecError, FrameCodec, Inbound, Outbound};
pub use infrastructure::ws::reconnect::{ReconnectConfig, ReconnectPolicy};
pub use infrastructure::ws::transport::WsTransport;
