//! Application state shared by the HTTP handlers and background tasks

use shared::models::Order;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use crate::cache::FifoCache;
use crate::db::{MemoryOrderStore, OrderStore, PgOrderStore};
use crate::ingest::IngestAdapter;
use crate::services::{OrderService, SchemaValidator};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    /// Concrete cache handle, for introspection
    pub cache: Arc<FifoCache<String, Order>>,
    pub ingest: IngestAdapter,
    /// Stop accepting new work
    pub shutdown: CancellationToken,
    /// Stop in-flight store work; fired when the shutdown grace period ends
    pub abort: CancellationToken,
}

impl AppState {
    /// Connect the store selected by `config` and wire the pipeline
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn OrderStore> = if config.uses_memory_store() {
            tracing::warn!("Using in-memory order store; orders are lost on restart");
            Arc::new(MemoryOrderStore::new())
        } else {
            let store = PgOrderStore::connect(
                &config.database_url,
                config.db_max_connections,
                config.db_acquire_timeout,
            )
            .await?;
            store.migrate().await?;
            tracing::info!("Database ready");
            Arc::new(store)
        };

        Ok(Self::with_store(store, config.cache_capacity))
    }

    /// Wire the pipeline around an existing store
    pub fn with_store(store: Arc<dyn OrderStore>, cache_capacity: usize) -> Self {
        let cache = Arc::new(FifoCache::new(cache_capacity));
        let orders = OrderService::new(store, cache.clone(), Arc::new(SchemaValidator));
        let abort = CancellationToken::new();

        Self {
            ingest: IngestAdapter::new(orders.clone(), abort.clone()),
            orders,
            cache,
            shutdown: CancellationToken::new(),
            abort,
        }
    }
}
