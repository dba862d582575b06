//! Market Data and Portfolio Types
//!
//! The data shapes shared by both channels. Push frames carry `PriceTick` and
//! `PortfolioSnapshot`; the pull channel returns the same snapshot shape plus
//! position and trade records.
//!
//! All monetary values use `rust_decimal::Decimal` and all timestamps are
//! UTC. A tick or snapshot is immutable once constructed: a newer value for
//! the same key replaces the old one wholesale, never field by field.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trading pair symbol (e.g. "BTCUSDT").
pub type Symbol = String;

/// Mapping from symbol to its latest tick. At most one tick per symbol.
pub type PriceBoard = HashMap<Symbol, PriceTick>;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionType {
    /// Profits when the price rises.
    Long,
    /// Profits when the price falls.
    Short,
}

/// Lifecycle status of a position on the pull channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Position is live and accrues unrealized P&L.
    Open,
    /// Position has been closed out.
    Closed,
}

impl PositionStatus {
    /// Query-parameter form used by the pull channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

/// A single market price observation for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading pair symbol, the unique key.
    pub symbol: Symbol,
    /// Last traded price.
    pub price: Decimal,
    /// Price change over the trailing 24 hours, in percent.
    pub change_24h: Decimal,
    /// Highest price over the trailing 24 hours.
    pub high_24h: Decimal,
    /// Lowest price over the trailing 24 hours.
    pub low_24h: Decimal,
    /// Trailing 24 hour volume.
    pub volume: Decimal,
    /// Server-side observation time.
    pub timestamp: DateTime<Utc>,
}

/// One position inside a portfolio snapshot.
///
/// Owned by the snapshot that contains it; the totals on the snapshot were
/// computed from exactly this position list, so positions are never patched
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Server-assigned position id.
    pub id: Uuid,
    /// Trading pair symbol.
    pub symbol: Symbol,
    /// Position size.
    pub quantity: Decimal,
    /// Average entry price.
    pub entry_price: Decimal,
    /// Mark price used for the P&L fields below.
    pub current_price: Decimal,
    /// Long or short.
    pub position_type: PositionType,
    /// Unrealized P&L at `current_price`.
    pub unrealized_pnl: Decimal,
    /// Unrealized P&L as a percentage of the invested amount.
    pub pnl_percentage: Decimal,
}

/// Full portfolio state, replaced as an atomic unit.
///
/// The totals are only consistent with the position list they were computed
/// from, so a snapshot is never merged field-wise with another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Sum of entry cost across open positions.
    pub total_invested: Decimal,
    /// Sum of mark value across open positions.
    pub total_current_value: Decimal,
    /// `total_current_value - total_invested`.
    pub total_unrealized_pnl: Decimal,
    /// Unrealized P&L as a percentage of `total_invested`.
    pub total_pnl_percentage: Decimal,
    /// Open positions backing the totals above.
    pub positions: Vec<Position>,
}

impl PortfolioSnapshot {
    /// An empty portfolio, the state at session start.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_invested: Decimal::ZERO,
            total_current_value: Decimal::ZERO,
            total_unrealized_pnl: Decimal::ZERO,
            total_pnl_percentage: Decimal::ZERO,
            positions: Vec::new(),
        }
    }
}

/// A completed fill returned by the trade-history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Server-assigned trade id.
    pub id: Uuid,
    /// Trading pair symbol.
    pub symbol: Symbol,
    /// BUY or SELL.
    pub side: TradeSide,
    /// Fill size.
    pub quantity: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// `quantity * price`.
    pub total_value: Decimal,
    /// Exchange fee charged for the fill.
    pub fee: Decimal,
    /// P&L realized by this fill.
    pub realized_pnl: Decimal,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
}

/// Side of a trade fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    /// Buy fill.
    Buy,
    /// Sell fill.
    Sell,
}

/// Request payload for opening a position over the pull channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPositionRequest {
    /// Trading pair symbol.
    pub symbol: Symbol,
    /// Position size, must be positive.
    pub quantity: Decimal,
    /// Entry price, must be positive.
    pub entry_price: Decimal,
    /// Long or short.
    pub position_type: PositionType,
}

/// Request payload for closing a position over the pull channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosePositionRequest {
    /// Close at this price; the server marks to market when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_type_wire_form() {
        assert_eq!(
            serde_json::to_string(&PositionType::Long).unwrap(),
            r#""LONG""#
        );
        let parsed: PositionType = serde_json::from_str(r#""SHORT""#).unwrap();
        assert_eq!(parsed, PositionType::Short);
    }

    #[test]
    fn price_tick_roundtrips_decimal_precision() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "price": 64123.45,
            "change_24h": -1.25,
            "high_24h": 65000.0,
            "low_24h": 63111.5,
            "volume": 1234.567,
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;

        let tick: PriceTick = serde_json::from_str(json).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, Decimal::new(6_412_345, 2));
        assert_eq!(tick.change_24h, Decimal::new(-125, 2));
    }

    #[test]
    fn empty_snapshot_has_zero_totals() {
        let snap = PortfolioSnapshot::empty();
        assert_eq!(snap.total_invested, Decimal::ZERO);
        assert!(snap.positions.is_empty());
    }

    #[test]
    fn close_request_omits_absent_exit_price() {
        let req = ClosePositionRequest { exit_price: None };
        assert_eq!(serde_json::to_string(&req).unwrap(), "{}");
    }
}
