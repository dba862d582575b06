//! Push/Pull Reconciliation Store
//!
//! Process-wide state cell holding the latest known price-by-symbol map and
//! the latest portfolio snapshot, merged from both channels under a
//! last-writer-with-recency-and-source-priority rule:
//!
//! - A push-delivered value always overwrites the stored value for its key.
//! - A pull-delivered value only overwrites if no push for that key arrived
//!   after the pull request was issued. Stale REST responses can never
//!   regress state the stream has already advanced past.
//! - On an exact timestamp tie, push wins (the stream is authoritative for
//!   live state).
//!
//! Readers get owned copies; the internal maps are never exposed for
//! mutation. Pull-layer cache refreshes write *into* this store instead of
//! keeping a second copy, so the two sources cannot diverge.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::market::{PortfolioSnapshot, PriceBoard, PriceTick, Symbol};

/// Which channel produced a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Persistent streaming connection (authoritative for live state).
    Push,
    /// Request/response fetch, possibly stale by the time it lands.
    Pull,
}

/// A stored value with its provenance.
#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    source: Source,
    received_at: DateTime<Utc>,
}

impl<T> Stamped<T> {
    fn push_now(value: T) -> Self {
        Self {
            value,
            source: Source::Push,
            received_at: Utc::now(),
        }
    }

    fn pull_at(value: T, issued_at: DateTime<Utc>) -> Self {
        Self {
            value,
            source: Source::Pull,
            received_at: issued_at,
        }
    }

    /// A pull result loses unless the stored value strictly predates the
    /// moment the pull was issued. Ties keep what is stored, so a push at
    /// the same instant wins.
    fn superseded_by_pull(&self, issued_at: DateTime<Utc>) -> bool {
        self.received_at < issued_at
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    prices: HashMap<Symbol, Stamped<PriceTick>>,
    portfolio: Option<Stamped<PortfolioSnapshot>>,
}

/// Read-only copy of the reconciled state, handed to consumers.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    /// Latest tick per symbol.
    pub prices: PriceBoard,
    /// Latest portfolio snapshot, if any source has delivered one.
    pub portfolio: Option<PortfolioSnapshot>,
}

/// Single source of truth read by presentation and pull-triggered caches.
///
/// Created empty at session start and discarded at teardown. Mutated only
/// through the documented entry points; `read` returns copies.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    inner: RwLock<StoreInner>,
}

impl ReconciliationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a push-delivered tick. Always wins immediately.
    pub fn apply_push_price(&self, tick: PriceTick) {
        let mut inner = self.inner.write();
        inner
            .prices
            .insert(tick.symbol.clone(), Stamped::push_now(tick));
    }

    /// Apply a push-delivered snapshot. Always wins immediately.
    pub fn apply_push_portfolio(&self, snapshot: PortfolioSnapshot) {
        self.inner.write().portfolio = Some(Stamped::push_now(snapshot));
    }

    /// Apply a pull-delivered tick.
    ///
    /// `issued_at` is the instant the pull request was sent. The tick is
    /// dropped if any update for the symbol landed at or after that instant.
    /// Returns `true` if the store changed.
    pub fn apply_pull_price(&self, tick: PriceTick, issued_at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write();
        match inner.prices.get(&tick.symbol) {
            Some(stored) if !stored.superseded_by_pull(issued_at) => {
                tracing::debug!(symbol = %tick.symbol, "pull tick older than stored state, dropped");
                false
            }
            _ => {
                inner
                    .prices
                    .insert(tick.symbol.clone(), Stamped::pull_at(tick, issued_at));
                true
            }
        }
    }

    /// Apply a pull-delivered snapshot under the same recency rule as
    /// [`apply_pull_price`](Self::apply_pull_price). Returns `true` if the
    /// store changed.
    pub fn apply_pull_portfolio(
        &self,
        snapshot: PortfolioSnapshot,
        issued_at: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.write();
        match &inner.portfolio {
            Some(stored) if !stored.superseded_by_pull(issued_at) => {
                tracing::debug!("pull snapshot older than stored state, dropped");
                false
            }
            _ => {
                inner.portfolio = Some(Stamped::pull_at(snapshot, issued_at));
                true
            }
        }
    }

    /// Read the reconciled state as owned copies.
    #[must_use]
    pub fn read(&self) -> BoardView {
        let inner = self.inner.read();
        BoardView {
            prices: inner
                .prices
                .iter()
                .map(|(symbol, stamped)| (symbol.clone(), stamped.value.clone()))
                .collect(),
            portfolio: inner.portfolio.as_ref().map(|s| s.value.clone()),
        }
    }

    /// Provenance of the stored value for a symbol, if any. Exposed for the
    /// connectivity indicator and for tests.
    #[must_use]
    pub fn price_source(&self, symbol: &str) -> Option<Source> {
        self.inner.read().prices.get(symbol).map(|s| s.source)
    }

    /// Provenance of the stored portfolio snapshot, if any.
    #[must_use]
    pub fn portfolio_source(&self) -> Option<Source> {
        self.inner.read().portfolio.as_ref().map(|s| s.source)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn tick(symbol: &str, price: i64) -> PriceTick {
        PriceTick {
            symbol: symbol.to_string(),
            price: Decimal::new(price, 0),
            change_24h: Decimal::ZERO,
            high_24h: Decimal::new(price, 0),
            low_24h: Decimal::new(price, 0),
            volume: Decimal::ONE,
            timestamp: Utc::now(),
        }
    }

    fn snapshot(invested: i64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_invested: Decimal::new(invested, 0),
            ..PortfolioSnapshot::empty()
        }
    }

    #[test]
    fn push_tick_replaces_previous_tick_wholesale() {
        let store = ReconciliationStore::new();
        store.apply_push_price(tick("BTCUSDT", 64_000));
        store.apply_push_price(tick("BTCUSDT", 64_100));

        let view = store.read();
        assert_eq!(view.prices.len(), 1);
        assert_eq!(view.prices["BTCUSDT"].price, Decimal::new(64_100, 0));
    }

    #[test]
    fn pull_issued_before_push_loses() {
        let store = ReconciliationStore::new();
        let issued_at = Utc::now();
        store.apply_push_price(tick("BTCUSDT", 64_100));

        // REST response fetched before the push arrived lands afterwards.
        assert!(!store.apply_pull_price(tick("BTCUSDT", 63_900), issued_at));
        let view = store.read();
        assert_eq!(view.prices["BTCUSDT"].price, Decimal::new(64_100, 0));
        assert_eq!(store.price_source("BTCUSDT"), Some(Source::Push));
    }

    #[test]
    fn pull_issued_after_last_push_wins() {
        let store = ReconciliationStore::new();
        store.apply_push_price(tick("ETHUSDT", 2_500));
        let issued_at = Utc::now() + Duration::milliseconds(5);

        assert!(store.apply_pull_price(tick("ETHUSDT", 2_510), issued_at));
        assert_eq!(
            store.read().prices["ETHUSDT"].price,
            Decimal::new(2_510, 0)
        );
        assert_eq!(store.price_source("ETHUSDT"), Some(Source::Pull));
    }

    #[test]
    fn pull_into_empty_store_populates() {
        let store = ReconciliationStore::new();
        assert!(store.apply_pull_portfolio(snapshot(100), Utc::now()));
        assert_eq!(store.portfolio_source(), Some(Source::Pull));
    }

    #[test]
    fn exact_timestamp_tie_keeps_push() {
        let store = ReconciliationStore::new();
        store.apply_push_portfolio(snapshot(100));
        let stored_at = {
            // A pull issued at exactly the stored instant must lose.
            let view = store.read();
            assert!(view.portfolio.is_some());
            Utc::now()
        };

        // issued_at earlier than or equal to the push stamp
        assert!(!store.apply_pull_portfolio(snapshot(50), stored_at - Duration::seconds(1)));
        assert_eq!(
            store.read().portfolio.map(|p| p.total_invested),
            Some(Decimal::new(100, 0))
        );
    }

    #[test]
    fn push_snapshot_overwrites_pull_snapshot() {
        let store = ReconciliationStore::new();
        store.apply_pull_portfolio(snapshot(100), Utc::now());
        store.apply_push_portfolio(snapshot(200));

        assert_eq!(store.portfolio_source(), Some(Source::Push));
        assert_eq!(
            store.read().portfolio.map(|p| p.total_invested),
            Some(Decimal::new(200, 0))
        );
    }

    #[test]
    fn read_returns_copies_not_views() {
        let store = ReconciliationStore::new();
        store.apply_push_price(tick("BTCUSDT", 1));

        let mut view = store.read();
        view.prices.remove("BTCUSDT");

        // Store state is untouched by consumer mutation of the copy.
        assert_eq!(store.read().prices.len(), 1);
    }

    #[test]
    fn ticks_for_different_symbols_are_independent() {
        let store = ReconciliationStore::new();
        store.apply_push_price(tick("BTCUSDT", 64_000));
        store.apply_push_price(tick("ETHUSDT", 2_500));

        let view = store.read();
        assert_eq!(view.prices.len(), 2);
    }
}
