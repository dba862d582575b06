//! Domain Layer - Core market data types and merge rules.
//!
//! This layer contains the pure types shared by both channels and the
//! reconciliation logic that decides which source is authoritative. No I/O,
//! no transport concerns.

/// Market data and portfolio types (ticks, snapshots, positions, trades).
pub mod market;

/// Push/pull reconciliation store.
pub mod reconcile;

/// Desired vs confirmed symbol subscription tracking.
pub mod subscription;
