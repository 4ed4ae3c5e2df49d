//! Order persistence
//!
//! [`OrderStore`] is the transactional seam between the orchestrator and the
//! relational store. An order aggregate spans four tables (`orders`, `items`,
//! `payment`, `delivery`) and is written in one transaction, in that order.
//!
//! - [`PgOrderStore`]: PostgreSQL via `sqlx`
//! - [`MemoryOrderStore`]: in-process store with fault injection

mod memory;
mod postgres;

pub use memory::{MemoryOrderStore, RowCounts};
pub use postgres::PgOrderStore;

use async_trait::async_trait;
use shared::models::Order;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// PostgreSQL SQLSTATE codes the store classifies
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    /// Class 08: connection exception
    pub const CONNECTION_CLASS: &str = "08";
}

/// Store failure taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An order with the same `order_uid` is already stored
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    /// Connection loss, pool exhaustion, serialization failure; worth retrying
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store failure: {0}")]
    Fatal(String),

    /// The caller's cancellation token fired before the operation finished
    #[error("Store operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Fold a failed rollback into the error that triggered it.
    ///
    /// The original kind is kept so callers still classify the failure by its
    /// cause.
    pub(crate) fn with_rollback_failure(self, rollback: impl fmt::Display) -> Self {
        let suffix = |msg: String| format!("{msg} (rollback failed: {rollback})");
        match self {
            StoreError::Conflict(msg) => StoreError::Conflict(suffix(msg)),
            StoreError::NotFound(msg) => StoreError::NotFound(suffix(msg)),
            StoreError::Transient(msg) => StoreError::Transient(suffix(msg)),
            StoreError::Fatal(msg) => StoreError::Fatal(suffix(msg)),
            StoreError::Cancelled => {
                tracing::error!(error = %rollback, "Rollback after cancellation failed");
                StoreError::Cancelled
            }
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
            sqlx::Error::Database(db) => {
                let code = db.code().unwrap_or_default();
                if code == sqlstate::UNIQUE_VIOLATION {
                    StoreError::Conflict(db.message().to_string())
                } else if code == sqlstate::SERIALIZATION_FAILURE
                    || code == sqlstate::DEADLOCK_DETECTED
                    || code.starts_with(sqlstate::CONNECTION_CLASS)
                {
                    StoreError::Transient(db.message().to_string())
                } else {
                    StoreError::Fatal(err.to_string())
                }
            }
            _ => StoreError::Fatal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Fatal(format!("migration failed: {err}"))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Tables making up one order aggregate, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Orders,
    Items,
    Payment,
    Delivery,
}

impl Table {
    pub const WRITE_ORDER: [Table; 4] = [
        Table::Orders,
        Table::Items,
        Table::Payment,
        Table::Delivery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Orders => "orders",
            Table::Items => "items",
            Table::Payment => "payment",
            Table::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fail with [`StoreError::Cancelled`] once `cancel` has fired
pub(crate) fn ensure_active(cancel: &CancellationToken) -> StoreResult<()> {
    if cancel.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}

/// Transactional persistence of order aggregates
///
/// Implementations check `cancel` between statement groups and abandon the
/// transaction with [`StoreError::Cancelled`] once it fires.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the whole aggregate atomically.
    ///
    /// A duplicate `order_uid` fails with [`StoreError::Conflict`] and leaves
    /// the stored rows untouched.
    async fn insert(&self, order: &Order, cancel: &CancellationToken) -> StoreResult<()>;

    /// Load the whole aggregate from one consistent snapshot
    async fn fetch_by_id(&self, order_uid: &str, cancel: &CancellationToken) -> StoreResult<Order>;

    /// Up to `limit` order ids, newest `date_created` first
    async fn list_recent_ids(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<String>>;
}
