//! Configuration Module
//!
//! Environment-driven settings for the sync core.

mod settings;

pub use settings::{ConfigError, SyncSettings, DEFAULT_SYMBOLS};
