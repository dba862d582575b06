//! Application Layer - Use cases and port definitions.
//!
//! This layer defines the interfaces through which the synchronization core
//! talks to the outside world, and the thin services that orchestrate them.

/// Port interfaces for external systems (push transport, session, pull API).
pub mod ports;

/// Application services coordinating ports and the domain.
pub mod services;
