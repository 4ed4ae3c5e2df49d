//! Ingestion adapter: decode → create → settle
//!
//! This is the idempotency boundary of the pipeline. A conflict means an
//! earlier delivery of the same order already committed, so it is acked.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use shared::models::Order;
use tokio_util::sync::CancellationToken;

use super::{Disposition, MessageSource};
use crate::error::OrderError;
use crate::services::OrderService;

/// Disposition counters since startup
#[derive(Debug, Default)]
pub struct IngestStats {
    acked: AtomicU64,
    duplicates: AtomicU64,
    retried: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub acked: u64,
    /// Acked conflicts, included in `acked`
    pub duplicates: u64,
    pub retried: u64,
    pub rejected: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            acked: self.acked.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn record(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Ack => &self.acked,
            Disposition::Retry => &self.retried,
            Disposition::Reject => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Turns inbound payloads into orders and reports each outcome
#[derive(Clone)]
pub struct IngestAdapter {
    service: OrderService,
    /// Passed to store operations; fires only when in-flight work must stop
    abort: CancellationToken,
    stats: Arc<IngestStats>,
}

impl IngestAdapter {
    pub fn new(service: OrderService, abort: CancellationToken) -> Self {
        Self {
            service,
            abort,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Handle one payload
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let disposition = self.dispose(payload).await;
        self.stats.record(disposition);
        disposition
    }

    async fn dispose(&self, payload: &[u8]) -> Disposition {
        let order: Order = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, len = payload.len(), "Rejecting undecodable message");
                return Disposition::Reject;
            }
        };
        let order_uid = order.order_uid.clone();

        match self.service.create(order, &self.abort).await {
            Ok(()) => Disposition::Ack,
            Err(e) if e.is_conflict() => {
                tracing::info!(order_uid = %order_uid, "Order already applied, acknowledging redelivery");
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                Disposition::Ack
            }
            Err(OrderError::Validation(errors)) => {
                tracing::warn!(order_uid = %order_uid, error = %errors, "Rejecting invalid order");
                Disposition::Reject
            }
            Err(e) => {
                tracing::warn!(order_uid = %order_uid, error = %e, "Order not persisted, leaving for redelivery");
                Disposition::Retry
            }
        }
    }

    /// Consume `source` until it closes or `shutdown` fires.
    ///
    /// A message already taken from the source is handled and settled before
    /// the loop checks `shutdown` again.
    pub async fn run<S: MessageSource>(&self, mut source: S, shutdown: CancellationToken) {
        tracing::info!("Ingestion loop started");

        loop {
            let message = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Ingestion loop shutting down");
                    break;
                }

                message = source.recv() => match message {
                    Some(message) => message,
                    None => {
                        tracing::info!("Message source closed");
                        break;
                    }
                },
            };

            let disposition = self.handle(&message.payload).await;
            tracing::debug!(key = ?message.key, disposition = %disposition, "Message settled");
            message.settle(disposition);
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            acked = stats.acked,
            duplicates = stats.duplicates,
            retried = stats.retried,
            rejected = stats.rejected,
            "Ingestion loop stopped"
        );
    }
}
