//! Subscription Tracking
//!
//! Tracks the *desired* set of symbols (what the application wants streamed)
//! against the *confirmed* set (what the active connection has actually been
//! told to stream), and derives the minimal subscribe/unsubscribe diff to
//! send after any connection state change.
//!
//! # Design
//!
//! - `desired` is mutated by application-level subscribe/unsubscribe calls at
//!   any time, including while disconnected. It survives reconnects.
//! - `confirmed` only advances after a frame has actually left the client,
//!   and is reset to empty on every transition out of Connected.
//! - Invariant while connected: `confirmed ⊆ desired`.
//!
//! Symbols are normalized to uppercase, matching the server's bookkeeping,
//! so "btcusdt" and "BTCUSDT" never produce a spurious diff.

use std::collections::HashSet;

use crate::domain::market::Symbol;

// =============================================================================
// Subscription Changes
// =============================================================================

/// Minimal set of frames needed to bring the connection in line with
/// `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Symbols to subscribe to (`desired − confirmed`).
    pub subscribe: Vec<Symbol>,
    /// Symbols to unsubscribe from (`confirmed − desired`).
    pub unsubscribe: Vec<Symbol>,
}

impl SubscriptionChanges {
    /// Check whether the connection is already in sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Desired vs confirmed symbol sets for the single logical connection.
///
/// # Example
///
/// ```rust
/// use dashboard_sync::SubscriptionSet;
///
/// let mut subs = SubscriptionSet::new();
/// subs.subscribe(["btcusdt".to_string(), "ETHUSDT".to_string()]);
///
/// // Fresh connection: the whole desired set is the diff.
/// let changes = subs.diff();
/// assert_eq!(changes.subscribe.len(), 2);
/// assert!(changes.unsubscribe.is_empty());
///
/// // After the frame is actually sent, confirm it.
/// subs.mark_sent(&changes);
/// assert!(subs.diff().is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    desired: HashSet<Symbol>,
    confirmed: HashSet<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty subscription set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols to the desired set.
    ///
    /// Set semantics: adding an already-present symbol is a no-op, never an
    /// error. Returns `true` if the desired set changed.
    pub fn subscribe<I>(&mut self, symbols: I) -> bool
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut changed = false;
        for symbol in symbols {
            changed |= self.desired.insert(normalize(&symbol));
        }
        changed
    }

    /// Remove symbols from the desired set.
    ///
    /// Removing an absent symbol is a no-op. Returns `true` if the desired
    /// set changed.
    pub fn unsubscribe<'a, I>(&mut self, symbols: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut changed = false;
        for symbol in symbols {
            changed |= self.desired.remove(&normalize(symbol));
        }
        changed
    }

    /// Compute the minimal diff between `desired` and `confirmed`.
    ///
    /// For a fresh connection (`confirmed` empty) this degenerates to the
    /// entire desired set as one subscribe batch. Symbols are returned in
    /// sorted order so a given state always produces the same frames.
    #[must_use]
    pub fn diff(&self) -> SubscriptionChanges {
        let mut subscribe: Vec<Symbol> = self.desired.difference(&self.confirmed).cloned().collect();
        let mut unsubscribe: Vec<Symbol> =
            self.confirmed.difference(&self.desired).cloned().collect();
        subscribe.sort();
        unsubscribe.sort();

        SubscriptionChanges {
            subscribe,
            unsubscribe,
        }
    }

    /// Advance `confirmed` to reflect frames that have actually been sent.
    ///
    /// Must only be called after the corresponding subscribe/unsubscribe
    /// messages left the client on an open connection.
    pub fn mark_sent(&mut self, changes: &SubscriptionChanges) {
        for symbol in &changes.subscribe {
            self.confirmed.insert(symbol.clone());
        }
        for symbol in &changes.unsubscribe {
            self.confirmed.remove(symbol);
        }
    }

    /// Reset `confirmed` to empty on any transition out of Connected.
    ///
    /// `desired` is deliberately untouched; it remembers intent across
    /// reconnects.
    pub fn reset_confirmed(&mut self) {
        self.confirmed.clear();
    }

    /// Current desired symbols (copy).
    #[must_use]
    pub fn desired(&self) -> HashSet<Symbol> {
        self.desired.clone()
    }

    /// Current confirmed symbols (copy).
    #[must_use]
    pub fn confirmed(&self) -> HashSet<Symbol> {
        self.confirmed.clone()
    }
}

fn normalize(symbol: &str) -> Symbol {
    symbol.trim().to_uppercase()
}

// =============================================================================
// Tests
// =============================================================================
