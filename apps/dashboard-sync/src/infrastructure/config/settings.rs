//! Sync Settings
//!
//! Settings loaded from environment variables, with the dashboard's
//! defaults. The session token comes from `SESSION_ID`; everything else is
//! optional tuning.

use std::time::Duration;

use crate::infrastructure::ws::client::SyncConfig;
use crate::infrastructure::ws::reconnect::ReconnectConfig;

/// Default dashboard watchlist, streamed when no symbols are configured.
pub const DEFAULT_SYMBOLS: [&str; 10] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "SOLUSDT", "DOTUSDT",
    "MATICUSDT", "LTCUSDT",
];

/// Complete sync-core configuration.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Push endpoint base URL.
    pub ws_base_url: String,
    /// Session token used as the connection credential.
    pub session_id: String,
    /// Symbols to stream at startup.
    pub symbols: Vec<String>,
    /// Reconnection delay policy.
    pub reconnect: ReconnectConfig,
}

impl SyncSettings {
    /// Create settings from environment variables.
    ///
    /// - `WS_BASE_URL` (default `ws://localhost:8000`)
    /// - `SESSION_ID` (required)
    /// - `SYNC_SYMBOLS` comma-separated watchlist (default: the dashboard's
    ///   ten majors)
    /// - `SYNC_RECONNECT_DELAY_INITIAL_MS`, `SYNC_RECONNECT_DELAY_MAX_SECS`,
    ///   `SYNC_RECONNECT_DELAY_MULTIPLIER`, `SYNC_MAX_RECONNECT_ATTEMPTS`
    ///
    /// # Errors
    ///
    /// Returns an error if `SESSION_ID` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_id = std::env::var("SESSION_ID")
            .map_err(|_| ConfigError::MissingEnvVar("SESSION_ID".to_string()))?;
        if session_id.is_empty() {
            return Err(ConfigError::EmptyValue("SESSION_ID".to_string()));
        }

        let ws_base_url =
            std::env::var("WS_BASE_URL").unwrap_or_else(|_| "ws://localhost:8000".to_string());

        let symbols = std::env::var("SYNC_SYMBOLS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_SYMBOLS.iter().map(|s| (*s).to_string()).collect());

        let defaults = ReconnectConfig::default();
        let reconnect = ReconnectConfig {
            initial_delay: parse_env_duration_millis(
                "SYNC_RECONNECT_DELAY_INITIAL_MS",
                defaults.initial_delay,
            ),
            max_delay: parse_env_duration_secs("SYNC_RECONNECT_DELAY_MAX_SECS", defaults.max_delay),
            multiplier: parse_env_f64("SYNC_RECONNECT_DELAY_MULTIPLIER", defaults.multiplier),
            jitter_factor: defaults.jitter_factor,
            max_attempts: parse_env_u32("SYNC_MAX_RECONNECT_ATTEMPTS", defaults.max_attempts),
        };

        Ok(Self {
            ws_base_url,
            session_id,
            symbols,
            reconnect,
        })
    }

    /// Client configuration derived from these settings.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            reconnect: self.reconnect.clone(),
            ..SyncConfig::new(self.ws_base_url.clone())
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_symbols_cover_the_dashboard_watchlist() {
        assert_eq!(DEFAULT_SYMBOLS.len(), 10);
        assert!(DEFAULT_SYMBOLS.contains(&"BTCUSDT"));
    }

    #[test]
    fn sync_config_carries_reconnect_policy() {
        let settings = SyncSettings {
            ws_base_url: "ws://example".to_string(),
            session_id: "T1".to_string(),
            symbols: vec![],
            reconnect: ReconnectConfig::fixed(Duration::from_secs(3)),
        };

        let config = settings.sync_config();
        assert_eq!(config.ws_base_url, "ws://example");
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(3));
    }
}
