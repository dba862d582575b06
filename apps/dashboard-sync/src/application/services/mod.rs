//! Application Services
//!
//! Thin orchestration over the ports:
//!
//! - [`PullRefresher`]: issues pull-channel fetches and funnels the results
//!   through the reconciliation store, so the pull layer never keeps a
//!   second copy of state that could diverge from the stream.

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{PullApi, PullApiError, SessionBoundary};
use crate::domain::market::Symbol;
use crate::domain::reconcile::ReconciliationStore;

/// Issues pull fetches and reconciles them into the shared store.
///
/// Each refresh stamps the instant the request was issued *before* awaiting
/// the response; the store uses that stamp to refuse results that the push
/// channel has already advanced past. Redundant refreshes while the stream
/// is healthy are allowed and harmless.
pub struct PullRefresher<A, S> {
    api: Arc<A>,
    session: Arc<S>,
    store: Arc<ReconciliationStore>,
}

impl<A, S> PullRefresher<A, S>
where
    A: PullApi,
    S: SessionBoundary,
{
    /// Create a refresher writing into `store`.
    #[must_use]
    pub fn new(api: Arc<A>, session: Arc<S>, store: Arc<ReconciliationStore>) -> Self {
        Self {
            api,
            session,
            store,
        }
    }

    /// Fetch the portfolio snapshot and reconcile it.
    ///
    /// Returns `true` if the store accepted the result.
    ///
    /// # Errors
    ///
    /// Propagates pull-channel failures; `Unauthorized` additionally
    /// invalidates the session boundary.
    pub async fn refresh_portfolio(&self) -> Result<bool, PullApiError> {
        let issued_at = Utc::now();
        let snapshot = match self.api.fetch_portfolio().await {
            Ok(snapshot) => snapshot,
            Err(PullApiError::Unauthorized) => {
                self.session.on_auth_rejected();
                return Err(PullApiError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let applied = self.store.apply_pull_portfolio(snapshot, issued_at);
        tracing::debug!(applied, "portfolio refresh reconciled");
        Ok(applied)
    }

    /// Fetch the latest REST quote for `symbol` and reconcile it, when the
    /// backend offers one.
    ///
    /// # Errors
    ///
    /// Propagates pull-channel failures.
    pub async fn refresh_price(&self, symbol: &Symbol) -> Result<bool, PullApiError> {
        let issued_at = Utc::now();
        let Some(tick) = self.api.fetch_price(symbol).await? else {
            return Ok(false);
        };

        Ok(self.store.apply_pull_price(tick, issued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::StaticSession;
    use crate::domain::market::{
        ClosePositionRequest, OpenPositionRequest, PortfolioSnapshot, Position, PositionStatus,
        Trade,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct FixedApi {
        unauthorized: bool,
    }

    #[async_trait]
    impl PullApi for FixedApi {
        async fn fetch_portfolio(&self) -> Result<PortfolioSnapshot, PullApiError> {
            if self.unauthorized {
                return Err(PullApiError::Unauthorized);
            }
            Ok(PortfolioSnapshot {
                total_invested: Decimal::new(100, 0),
                ..PortfolioSnapshot::empty()
            })
        }

        async fn fetch_positions(
            &self,
            _status: Option<PositionStatus>,
        ) -> Result<Vec<Position>, PullApiError> {
            Ok(vec![])
        }

        async fn open_position(
            &self,
            _request: OpenPositionRequest,
        ) -> Result<Position, PullApiError> {
            Err(PullApiError::Request("not supported".to_string()))
        }

        async fn close_position(
            &self,
            _id: uuid::Uuid,
            _request: ClosePositionRequest,
        ) -> Result<Position, PullApiError> {
            Err(PullApiError::Request("not supported".to_string()))
        }

        async fn fetch_trades(
            &self,
            _skip: usize,
            _limit: usize,
        ) -> Result<Vec<Trade>, PullApiError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn refresh_writes_into_store() {
        let store = Arc::new(ReconciliationStore::new());
        let refresher = PullRefresher::new(
            Arc::new(FixedApi {
                unauthorized: false,
            }),
            Arc::new(StaticSession::new("T1")),
            Arc::clone(&store),
        );

        assert!(refresher.refresh_portfolio().await.unwrap());
        assert_eq!(
            store.read().portfolio.map(|p| p.total_invested),
            Some(Decimal::new(100, 0))
        );
    }

    #[tokio::test]
    async fn refresh_loses_to_fresher_push() {
        let store = Arc::new(ReconciliationStore::new());
        let refresher = PullRefresher::new(
            Arc::new(FixedApi {
                unauthorized: false,
            }),
            Arc::new(StaticSession::new("T1")),
            Arc::clone(&store),
        );

        // Push lands while the (conceptual) pull is in flight.
        store.apply_push_portfolio(PortfolioSnapshot {
            total_invested: Decimal::new(999, 0),
            ..PortfolioSnapshot::empty()
        });
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        // A refresh issued before the push would be rejected by the store;
        // this one is issued after, so it wins.
        assert!(refresher.refresh_portfolio().await.unwrap());
    }

    #[tokio::test]
    async fn unauthorized_refresh_invalidates_session() {
        let store = Arc::new(ReconciliationStore::new());
        let session = Arc::new(StaticSession::new("T1"));
        let refresher = PullRefresher::new(
            Arc::new(FixedApi { unauthorized: true }),
            Arc::clone(&session),
            Arc::clone(&store),
        );

        assert!(refresher.refresh_portfolio().await.is_err());
        assert!(session.is_invalidated());
        assert!(store.read().portfolio.is_none());
    }
}
