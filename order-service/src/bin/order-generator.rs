//! order-generator: sends fake orders to the ingest endpoint
//!
//! Env: `INGEST_ADDR` (default `127.0.0.1:9092`), `GENERATOR_COUNT` (100),
//! `GENERATOR_INTERVAL_MS` (500).

use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use shared::models::{Delivery, Item, Order, Payment};
use std::time::Duration;

use order_service::ingest::{Disposition, TcpProducer};
use order_service::utils::logger;

/// Sends of one order before giving up on `retry` answers
const MAX_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

const BRANDS: &[&str] = &["Vivienne Sabo", "Nivea", "Loreal", "Maybelline", "Garnier"];
const PRODUCTS: &[&str] = &["Mascaras", "Lipstick", "Shampoo", "Face Cream", "Perfume"];
const CITIES: &[&str] = &["Kiryat Mozkin", "Haifa", "Tel Aviv", "Eilat", "Ashdod"];
const BANKS: &[&str] = &["alpha", "sber", "tinkoff"];
const CURRENCIES: &[&str] = &["USD", "EUR", "RUB"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logger::init_logger("order_generator=info,order_service=info", false);

    let addr = std::env::var("INGEST_ADDR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "127.0.0.1:9092".to_string());
    let count: usize = env_or("GENERATOR_COUNT", 100)?;
    let interval = Duration::from_millis(env_or("GENERATOR_INTERVAL_MS", 500)?);

    let mut producer = TcpProducer::connect(addr.as_str())
        .await
        .with_context(|| format!("failed to connect to ingest endpoint {addr}"))?;
    tracing::info!("Sending {count} orders to {addr} every {}ms", interval.as_millis());

    let mut ticker = tokio::time::interval(interval);
    let (mut acked, mut rejected, mut gave_up) = (0usize, 0usize, 0usize);

    for _ in 0..count {
        ticker.tick().await;

        let order = fake_order(&mut rand::thread_rng());
        let payload = serde_json::to_vec(&order)?;

        match send_with_retry(&mut producer, &payload).await? {
            Disposition::Ack => {
                tracing::info!(order_uid = %order.order_uid, "Order accepted");
                acked += 1;
            }
            Disposition::Reject => {
                tracing::warn!(order_uid = %order.order_uid, "Order rejected");
                rejected += 1;
            }
            Disposition::Retry => {
                tracing::warn!(order_uid = %order.order_uid, "Order still not accepted after {MAX_ATTEMPTS} attempts");
                gave_up += 1;
            }
        }
    }

    tracing::info!(acked, rejected, gave_up, "Generator finished");
    Ok(())
}

/// Send until acked or rejected, backing off between `retry` answers
async fn send_with_retry(
    producer: &mut TcpProducer,
    payload: &[u8],
) -> anyhow::Result<Disposition> {
    let mut delay = RETRY_BASE_DELAY;
    for attempt in 1..=MAX_ATTEMPTS {
        let disposition = producer.send(payload).await?;
        if disposition != Disposition::Retry || attempt == MAX_ATTEMPTS {
            return Ok(disposition);
        }
        tracing::debug!(attempt, "Server asked to retry");
        tokio::time::sleep(delay).await;
        delay *= 2;
    }
    Ok(Disposition::Retry)
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} has invalid value {value:?}")),
        _ => Ok(default),
    }
}

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn random_upper(rng: &mut impl Rng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect()
}

fn fake_order<R: Rng>(rng: &mut R) -> Order {
    let order_uid = uuid::Uuid::new_v4().simple().to_string();
    let track_number = format!("WBIL{}", random_upper(rng, 10));

    let items: Vec<Item> = (0..rng.gen_range(1..=3))
        .map(|_| {
            let price = rng.gen_range(100..5000);
            let sale = rng.gen_range(0..=50);
            Item {
                chrt_id: rng.gen_range(1_000_000..10_000_000),
                track_number: track_number.clone(),
                price,
                rid: uuid::Uuid::new_v4().simple().to_string(),
                name: pick(rng, PRODUCTS).to_string(),
                sale,
                size: rng.gen_range(0..5u8).to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: rng.gen_range(1_000_000..10_000_000),
                brand: pick(rng, BRANDS).to_string(),
                status: 202,
            }
        })
        .collect();

    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = rng.gen_range(0..2000);
    let now = Utc::now();

    Order {
        order_uid: order_uid.clone(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: format!("Customer {}", random_upper(rng, 4)),
            phone: format!("+972{:07}", rng.gen_range(0..10_000_000)),
            zip: format!("{:07}", rng.gen_range(0..10_000_000)),
            city: pick(rng, CITIES).to_string(),
            address: format!("Ploshad Mira {}", rng.gen_range(1..200)),
            region: "Kraiot".to_string(),
            email: format!("{}@example.com", random_upper(rng, 6).to_lowercase()),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: uuid::Uuid::new_v4().to_string(),
            currency: pick(rng, CURRENCIES).to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: now.timestamp(),
            bank: pick(rng, BANKS).to_string(),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: format!("customer-{}", rng.gen_range(1..1000)),
        delivery_service: "meest".to_string(),
        shardkey: rng.gen_range(0..10u8).to_string(),
        sm_id: rng.gen_range(0..100),
        date_created: now,
        oof_shard: "1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_fake_orders_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let order = fake_order(&mut rng);
            assert!(order.validate().is_ok(), "{order:?}");
            assert!((1..=3).contains(&order.items.len()));
            assert_eq!(
                order.payment.amount,
                order.payment.goods_total + order.payment.delivery_cost
            );
        }
    }
}
