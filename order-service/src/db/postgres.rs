//! PostgreSQL order store

use async_trait::async_trait;
use shared::models::{Delivery, Item, Order, Payment};
use sqlx::PgConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{OrderStore, StoreError, StoreResult, Table, ensure_active};

const SELECT_ORDER: &str = r#"
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
           delivery_service, shardkey, sm_id, date_created, oof_shard
    FROM orders
    WHERE order_uid = $1
"#;

const SELECT_ITEMS: &str = r#"
    SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status
    FROM items
    WHERE order_uid = $1
    ORDER BY id
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT transaction, request_id, currency, provider, amount, payment_dt, bank,
           delivery_cost, goods_total, custom_fee
    FROM payment
    WHERE order_uid = $1
"#;

const SELECT_DELIVERY: &str = r#"
    SELECT name, phone, zip, city, address, region, email
    FROM delivery
    WHERE order_uid = $1
"#;

/// Order store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_active(cancel)?;
        let mut tx = self.pool.begin().await?;

        match write_aggregate(&mut *tx, order, cancel).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::debug!(order_uid = %order.order_uid, items = order.items.len(), "Order committed");
                Ok(())
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(err.with_rollback_failure(rollback)),
            },
        }
    }

    async fn fetch_by_id(&self, order_uid: &str, cancel: &CancellationToken) -> StoreResult<Order> {
        ensure_active(cancel)?;
        let mut tx = self.pool.begin().await?;

        match read_aggregate(&mut *tx, order_uid, cancel).await {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(err.with_rollback_failure(rollback)),
            },
        }
    }

    async fn list_recent_ids(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<String>> {
        ensure_active(cancel)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let ids = sqlx::query_scalar::<_, String>(
            "SELECT order_uid FROM orders ORDER BY date_created DESC, order_uid DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Insert every row of the aggregate on an open transaction
async fn write_aggregate(
    conn: &mut PgConnection,
    order: &Order,
    cancel: &CancellationToken,
) -> StoreResult<()> {
    // 1. orders
    sqlx::query(
        r#"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature, customer_id,
            delivery_service, shardkey, sm_id, date_created, oof_shard
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(&mut *conn)
    .await
    .map_err(|e| statement_error(Table::Orders, &order.order_uid, e))?;

    // 2. items, in aggregate order so `id` preserves it
    ensure_active(cancel)?;
    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO items (
                order_uid, chrt_id, track_number, price, rid, name, sale, size,
                total_price, nm_id, brand, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&order.order_uid)
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&mut *conn)
        .await
        .map_err(|e| statement_error(Table::Items, &order.order_uid, e))?;
    }

    // 3. payment
    ensure_active(cancel)?;
    let payment = &order.payment;
    sqlx::query(
        r#"
        INSERT INTO payment (
            order_uid, transaction, request_id, currency, provider, amount, payment_dt,
            bank, delivery_cost, goods_total, custom_fee
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&order.order_uid)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut *conn)
    .await
    .map_err(|e| statement_error(Table::Payment, &order.order_uid, e))?;

    // 4. delivery
    ensure_active(cancel)?;
    let delivery = &order.delivery;
    sqlx::query(
        r#"
        INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&order.order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(&mut *conn)
    .await
    .map_err(|e| statement_error(Table::Delivery, &order.order_uid, e))?;

    ensure_active(cancel)
}

/// Read every row of the aggregate from one `REPEATABLE READ` snapshot
async fn read_aggregate(
    conn: &mut PgConnection,
    order_uid: &str,
    cancel: &CancellationToken,
) -> StoreResult<Order> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *conn)
        .await?;

    let mut order = sqlx::query_as::<_, Order>(SELECT_ORDER)
        .bind(order_uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

    ensure_active(cancel)?;
    order.items = sqlx::query_as::<_, Item>(SELECT_ITEMS)
        .bind(order_uid)
        .fetch_all(&mut *conn)
        .await?;

    ensure_active(cancel)?;
    order.payment = sqlx::query_as::<_, Payment>(SELECT_PAYMENT)
        .bind(order_uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| missing_row(Table::Payment, order_uid))?;

    ensure_active(cancel)?;
    order.delivery = sqlx::query_as::<_, Delivery>(SELECT_DELIVERY)
        .bind(order_uid)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| missing_row(Table::Delivery, order_uid))?;

    Ok(order)
}

fn statement_error(table: Table, order_uid: &str, err: sqlx::Error) -> StoreError {
    let err = StoreError::from(err);
    match err {
        StoreError::Conflict(_) => StoreError::Conflict(order_uid.to_string()),
        other => {
            tracing::warn!(order_uid = %order_uid, table = %table, error = %other, "Insert statement failed");
            other
        }
    }
}

/// A committed aggregate always has its 1:1 rows
fn missing_row(table: Table, order_uid: &str) -> StoreError {
    StoreError::Fatal(format!("order {order_uid} has no {table} row"))
}
