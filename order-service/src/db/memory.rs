//! In-process order store
//!
//! Keeps the four tables as separate collections so partial writes are
//! observable, and rolls a failed insert back through an undo journal.
//! Faults can be injected per table to exercise the rollback path.
//! Selected at runtime with `DATABASE_URL=memory://`.

use async_trait::async_trait;
use chrono::SubsecRound;
use parking_lot::Mutex;
use shared::models::{Delivery, Item, Order, Payment};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use super::{OrderStore, StoreError, StoreResult, Table, ensure_active};

#[derive(Default)]
struct Tables {
    /// Order headers; relations are empty here and live in their own tables
    orders: HashMap<String, Order>,
    /// Item rows in insertion order, like a serial primary key
    items: Vec<(String, Item)>,
    payment: HashMap<String, Payment>,
    delivery: HashMap<String, Delivery>,
}

/// Row counts per table for one order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub orders: usize,
    pub items: usize,
    pub payment: usize,
    pub delivery: usize,
}

impl RowCounts {
    pub fn total(&self) -> usize {
        self.orders + self.items + self.payment + self.delivery
    }
}

/// Order store held in memory
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<Table, StoreError>>,
    /// Token to cancel once the rows of a table are written
    cancel_hook: Mutex<Option<(Table, CancellationToken)>>,
    inserts: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to, or read from, `table` fail with `error`
    pub fn fail_on(&self, table: Table, error: StoreError) {
        self.faults.lock().insert(table, error);
    }

    /// Cancel `token` right after the rows of `table` are written, so an
    /// insert running on `token` aborts at the next step boundary
    pub fn cancel_after(&self, table: Table, token: CancellationToken) {
        *self.cancel_hook.lock() = Some((table, token));
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
        self.cancel_hook.lock().take();
    }

    fn run_cancel_hook(&self, written: Table) {
        if let Some((table, token)) = self.cancel_hook.lock().as_ref()
            && *table == written
        {
            token.cancel();
        }
    }

    /// Rows stored for `order_uid` in each table
    pub fn row_counts(&self, order_uid: &str) -> RowCounts {
        let tables = self.tables.lock();
        RowCounts {
            orders: usize::from(tables.orders.contains_key(order_uid)),
            items: tables.items.iter().filter(|(uid, _)| uid == order_uid).count(),
            payment: usize::from(tables.payment.contains_key(order_uid)),
            delivery: usize::from(tables.delivery.contains_key(order_uid)),
        }
    }

    pub fn order_count(&self) -> usize {
        self.tables.lock().orders.len()
    }

    /// Number of `insert` calls so far
    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Number of `fetch_by_id` calls so far
    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn check_fault(&self, table: Table) -> StoreResult<()> {
        match self.faults.lock().get(&table) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn write_aggregate(
        &self,
        tables: &mut Tables,
        order: &Order,
        cancel: &CancellationToken,
    ) -> StoreResult<()> {
        for table in Table::WRITE_ORDER {
            ensure_active(cancel)?;
            self.check_fault(table)?;
            match table {
                Table::Orders => {
                    if tables.orders.contains_key(&order.order_uid) {
                        return Err(StoreError::Conflict(order.order_uid.clone()));
                    }
                    // TIMESTAMPTZ keeps microseconds
                    let header = Order {
                        items: Vec::new(),
                        payment: Payment::default(),
                        delivery: Delivery::default(),
                        date_created: order.date_created.trunc_subsecs(6),
                        ..order.clone()
                    };
                    tables.orders.insert(order.order_uid.clone(), header);
                }
                Table::Items => {
                    tables.items.extend(
                        order
                            .items
                            .iter()
                            .map(|item| (order.order_uid.clone(), item.clone())),
                    );
                }
                Table::Payment => {
                    tables
                        .payment
                        .insert(order.order_uid.clone(), order.payment.clone());
                }
                Table::Delivery => {
                    tables
                        .delivery
                        .insert(order.order_uid.clone(), order.delivery.clone());
                }
            }
            self.run_cancel_hook(table);
        }
        ensure_active(cancel)
    }

    fn read_aggregate(
        &self,
        tables: &Tables,
        order_uid: &str,
        cancel: &CancellationToken,
    ) -> StoreResult<Order> {
        let mut order = Order::default();
        for table in Table::WRITE_ORDER {
            ensure_active(cancel)?;
            self.check_fault(table)?;
            match table {
                Table::Orders => {
                    order = tables
                        .orders
                        .get(order_uid)
                        .cloned()
                        .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;
                }
                Table::Items => {
                    order.items = tables
                        .items
                        .iter()
                        .filter(|(uid, _)| uid == order_uid)
                        .map(|(_, item)| item.clone())
                        .collect();
                }
                Table::Payment => {
                    order.payment = tables.payment.get(order_uid).cloned().ok_or_else(|| {
                        StoreError::Fatal(format!("order {order_uid} has no payment row"))
                    })?;
                }
                Table::Delivery => {
                    order.delivery = tables.delivery.get(order_uid).cloned().ok_or_else(|| {
                        StoreError::Fatal(format!("order {order_uid} has no delivery row"))
                    })?;
                }
            }
        }
        Ok(order)
    }
}

/// Remove every row written for `order_uid` by a failed insert
fn rollback(tables: &mut Tables, order_uid: &str, items_before: usize) {
    tables.orders.remove(order_uid);
    tables.items.truncate(items_before);
    tables.payment.remove(order_uid);
    tables.delivery.remove(order_uid);
}

impl std::fmt::Debug for MemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOrderStore")
            .field("orders", &self.tables.lock().orders.len())
            .finish()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order, cancel: &CancellationToken) -> StoreResult<()> {
        self.inserts.fetch_add(1, Ordering::Relaxed);

        // The table lock is the transaction boundary
        let mut tables = self.tables.lock();
        let items_before = tables.items.len();
        let existed = tables.orders.contains_key(&order.order_uid);

        let result = self.write_aggregate(&mut tables, order, cancel);
        if result.is_err() && !existed {
            rollback(&mut tables, &order.order_uid, items_before);
        }
        result
    }

    async fn fetch_by_id(&self, order_uid: &str, cancel: &CancellationToken) -> StoreResult<Order> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let tables = self.tables.lock();
        self.read_aggregate(&tables, order_uid, cancel)
    }

    async fn list_recent_ids(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<String>> {
        ensure_active(cancel)?;
        self.check_fault(Table::Orders)?;

        let tables = self.tables.lock();
        let mut headers: Vec<&Order> = tables.orders.values().collect();
        headers.sort_by(|a, b| {
            b.date_created
                .cmp(&a.date_created)
                .then_with(|| b.order_uid.cmp(&a.order_uid))
        });

        Ok(headers
            .into_iter()
            .take(limit)
            .map(|order| order.order_uid.clone())
            .collect())
    }
}
