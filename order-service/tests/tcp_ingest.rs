//! Producer → TCP listener → ingestion loop → store, over a real socket

use order_service::core::AppState;
use order_service::db::{MemoryOrderStore, StoreError, Table};
use order_service::ingest::{self, Disposition, TcpIngestListener, TcpProducer};
use shared::models::fixtures;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    state: AppState,
    store: Arc<MemoryOrderStore>,
    addr: SocketAddr,
    shutdown: CancellationToken,
    ingest_loop: JoinHandle<()>,
}

async fn start() -> Running {
    let store = Arc::new(MemoryOrderStore::new());
    let state = AppState::with_store(store.clone(), 16);
    let shutdown = state.shutdown.clone();

    let (sink, source) = ingest::channel(8);
    let listener = TcpIngestListener::bind("127.0.0.1:0", sink, shutdown.clone())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());

    let adapter = state.ingest.clone();
    let loop_shutdown = shutdown.clone();
    let ingest_loop = tokio::spawn(async move { adapter.run(source, loop_shutdown).await });

    Running {
        state,
        store,
        addr,
        shutdown,
        ingest_loop,
    }
}

#[tokio::test]
async fn test_ingested_order_is_persisted_and_cached() {
    let running = start().await;
    let mut producer = TcpProducer::connect(running.addr).await.unwrap();
    let order = fixtures::order_with_items("tcp-1", 2);

    let disposition = producer
        .send(&serde_json::to_vec(&order).unwrap())
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(running.store.row_counts("tcp-1").total(), 5);
    let token = CancellationToken::new();
    assert_eq!(running.state.orders.get("tcp-1", &token).await.unwrap(), order);
    assert_eq!(running.store.fetch_calls(), 0);
}

#[tokio::test]
async fn test_redelivery_and_poison_messages() {
    let running = start().await;
    let mut producer = TcpProducer::connect(running.addr).await.unwrap();
    let payload = serde_json::to_vec(&fixtures::order("again")).unwrap();

    assert_eq!(producer.send(&payload).await.unwrap(), Disposition::Ack);
    assert_eq!(producer.send(&payload).await.unwrap(), Disposition::Ack);
    assert_eq!(producer.send(b"{oops").await.unwrap(), Disposition::Reject);

    // The connection is still usable after a rejected frame
    let next = serde_json::to_vec(&fixtures::order("after")).unwrap();
    assert_eq!(producer.send(&next).await.unwrap(), Disposition::Ack);

    assert_eq!(running.store.order_count(), 2);
    let stats = running.state.ingest.stats().snapshot();
    assert_eq!(stats.acked, 3);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_store_outage_answers_retry() {
    let running = start().await;
    let mut producer = TcpProducer::connect(running.addr).await.unwrap();
    let payload = serde_json::to_vec(&fixtures::order("outage")).unwrap();

    running
        .store
        .fail_on(Table::Items, StoreError::Transient("connection refused".into()));
    assert_eq!(producer.send(&payload).await.unwrap(), Disposition::Retry);
    assert_eq!(running.store.row_counts("outage").total(), 0);

    running.store.clear_faults();
    assert_eq!(producer.send(&payload).await.unwrap(), Disposition::Ack);
}

#[tokio::test]
async fn test_shutdown_stops_ingestion_loop() {
    let running = start().await;
    running.shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), running.ingest_loop)
        .await
        .expect("ingestion loop did not stop")
        .unwrap();
}
