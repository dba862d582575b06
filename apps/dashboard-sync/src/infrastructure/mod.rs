//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the port interfaces defined in the
//! application layer.

/// WebSocket push-channel adapters (codec, reconnect policy, lifecycle
/// manager, tungstenite transport).
pub mod ws;

/// Environment-driven configuration.
pub mod config;
