//! Order Service - write-through create, cache-aside lookup, startup warm-up

use chrono::SubsecRound;
use shared::models::{Order, not_blank};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::order_validator::OrderValidator;
use crate::cache::OrderCache;
use crate::db::{OrderStore, StoreError};
use crate::error::{OrderError, OrderResult};

/// Fractional-second digits kept by `TIMESTAMPTZ`
const STORED_SUBSEC_DIGITS: u16 = 6;

/// Outcome of [`OrderService::warm_cache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Ids returned by the store listing
    pub listed: usize,
    /// Orders loaded into the cache
    pub loaded: usize,
    /// Ids skipped because their fetch failed
    pub failed: usize,
    /// Stopped early on cancellation
    pub cancelled: bool,
}

/// Orchestrates the store and the cache for one order pipeline
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    validator: Arc<dyn OrderValidator>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn OrderCache>,
        validator: Arc<dyn OrderValidator>,
    ) -> Self {
        Self {
            store,
            cache,
            validator,
        }
    }

    /// Validate, persist, then cache the order.
    ///
    /// Nothing is cached unless the store committed. `date_created` is cut to
    /// the microsecond precision of the store first, so the cached copy and a
    /// later read from the store are equal.
    pub async fn create(&self, mut order: Order, cancel: &CancellationToken) -> OrderResult<()> {
        self.validator.validate(&order)?;
        order.date_created = order.date_created.trunc_subsecs(STORED_SUBSEC_DIGITS);
        self.store.insert(&order, cancel).await?;

        tracing::info!(order_uid = %order.order_uid, items = order.items.len(), "Order created");
        self.cache.set(order);
        Ok(())
    }

    /// Look an order up, cache first.
    ///
    /// Negative lookups are never cached.
    pub async fn get(&self, order_uid: &str, cancel: &CancellationToken) -> OrderResult<Order> {
        not_blank(order_uid).map_err(OrderError::invalid_id)?;

        if let Some(order) = self.cache.get(order_uid) {
            tracing::trace!(order_uid = %order_uid, "Cache hit");
            return Ok(order);
        }

        let order = self.store.fetch_by_id(order_uid, cancel).await?;
        tracing::debug!(order_uid = %order_uid, "Cache miss, loaded from store");
        self.cache.set(order.clone());
        Ok(order)
    }

    /// Load up to `limit` of the newest orders into the cache.
    ///
    /// Orders are fetched oldest first so the newest end up last in eviction
    /// order. A failed fetch is logged and skipped; only a failed listing is
    /// an error.
    pub async fn warm_cache(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> OrderResult<WarmupReport> {
        let mut report = WarmupReport::default();
        if limit == 0 {
            return Ok(report);
        }

        let start = Instant::now();
        let ids = self.store.list_recent_ids(limit, cancel).await?;
        report.listed = ids.len();

        for order_uid in ids.iter().rev() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.store.fetch_by_id(order_uid, cancel).await {
                Ok(order) => {
                    self.cache.set(order);
                    report.loaded += 1;
                }
                Err(StoreError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(order_uid = %order_uid, error = %e, "Skipping order during cache warm-up");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            listed = report.listed,
            loaded = report.loaded,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cache warm-up finished"
        );
        Ok(report)
    }
}
