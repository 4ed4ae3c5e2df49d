//! In-memory order cache

mod fifo;

pub use fifo::FifoCache;

use shared::models::Order;

/// Cache seam used by [`crate::services::OrderService`]
pub trait OrderCache: Send + Sync {
    /// Owned copy of the cached order, if resident
    fn get(&self, order_uid: &str) -> Option<Order>;

    /// Cache `order` under its `order_uid`, replacing any cached copy
    fn set(&self, order: Order);
}

impl OrderCache for FifoCache<String, Order> {
    fn get(&self, order_uid: &str) -> Option<Order> {
        FifoCache::get(self, order_uid)
    }

    fn set(&self, order: Order) {
        let key = order.order_uid.clone();
        if let Some(evicted) = FifoCache::set(self, key, order) {
            tracing::trace!(order_uid = %evicted, "Evicted order from cache");
        }
    }
}
