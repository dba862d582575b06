//! WebSocket Push-Channel Adapters
//!
//! - **codec**: tagged JSON frames in and out
//! - **reconnect**: bounded delay policy for connection recovery
//! - **client**: the connection lifecycle state machine
//! - **transport**: tokio-tungstenite implementation of the transport port

pub mod client;
pub mod codec;
pub mod reconnect;
pub mod transport;

pub use client::{ConnectionState, SyncClient, SyncConfig, SyncHandle};
pub use codec::{CodecError, FrameCodec, Inbound, Outbound};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use transport::WsTransport;
