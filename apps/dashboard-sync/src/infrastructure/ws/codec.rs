//! Frame Codec
//!
//! Encodes outgoing control messages and decodes incoming frames into a
//! closed set of typed events. Frames are JSON objects tagged by a `type`
//! discriminator:
//!
//! - Inbound: `price_update`, `portfolio_snapshot`, `pnl_update`, `ping`
//! - Outbound: `subscribe`, `unsubscribe`, `pong`
//!
//! A malformed or unrecognized frame yields a [`CodecError`] that the caller
//! logs and discards; a single bad frame must never tear down the
//! connection.

use serde::{Deserialize, Serialize};

use crate::domain::market::{PortfolioSnapshot, PriceTick, Symbol};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing or shape validation failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame carries a `type` tag this client does not recognize.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The frame has no `type` tag at all.
    #[error("frame missing type tag")]
    MissingType,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Latest tick for one symbol.
    PriceUpdate(PriceTick),
    /// Full-replacement portfolio snapshot (tag `portfolio_snapshot`).
    PortfolioSnapshot(PortfolioSnapshot),
    /// Full-replacement portfolio snapshot (tag `pnl_update`); treated
    /// identically to `portfolio_snapshot`.
    PnlUpdate(PortfolioSnapshot),
    /// Server keepalive; must be answered with `pong` immediately.
    Ping,
}

/// An outbound control message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Start streaming the listed symbols.
    Subscribe {
        /// Symbols to add.
        symbols: Vec<Symbol>,
    },
    /// Stop streaming the listed symbols.
    Unsubscribe {
        /// Symbols to remove.
        symbols: Vec<Symbol>,
    },
    /// Keepalive reply to a server `ping`.
    Pong,
}

#[derive(Debug, Deserialize)]
struct DataFrame<T> {
    data: T,
}

/// Stateless JSON codec for the push channel.
#[derive(Debug, Default, Clone)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// [`CodecError::MissingType`] when the `type` tag is absent,
    /// [`CodecError::UnknownType`] for tags outside the closed set, and
    /// [`CodecError::Json`] when the payload fails shape validation.
    pub fn decode(&self, text: &str) -> Result<Inbound, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let Some(tag) = value.get("type").and_then(|t| t.as_str()) else {
            return Err(CodecError::MissingType);
        };

        match tag {
            "price_update" => {
                let frame: DataFrame<PriceTick> = serde_json::from_value(value)?;
                Ok(Inbound::PriceUpdate(frame.data))
            }
            "portfolio_snapshot" => {
                let frame: DataFrame<PortfolioSnapshot> = serde_json::from_value(value)?;
                Ok(Inbound::PortfolioSnapshot(frame.data))
            }
            "pnl_update" => {
                let frame: DataFrame<PortfolioSnapshot> = serde_json::from_value(value)?;
                Ok(Inbound::PnlUpdate(frame.data))
            }
            "ping" => Ok(Inbound::Ping),
            other => Err(CodecError::UnknownType(other.to_string())),
        }
    }

    /// Encode an outbound control message. Pure and side-effect free.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, message: &Outbound) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}
