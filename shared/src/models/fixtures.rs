//! Ready-made valid aggregates for tests in dependent crates
//!
//! Enabled with the `test-fixtures` feature.

use chrono::{DateTime, TimeZone, Utc};

use super::order::{Delivery, Item, Order, Payment};

/// A valid order with a single item, created at a fixed instant
pub fn order(order_uid: &str) -> Order {
    order_created_at(order_uid, Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap())
}

/// A valid order with a single item and the given creation time
pub fn order_created_at(order_uid: &str, date_created: DateTime<Utc>) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: format!("req-{order_uid}"),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![item(9_934_930)],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created,
        oof_shard: "1".to_string(),
    }
}

/// A valid order with `count` distinct items
pub fn order_with_items(order_uid: &str, count: usize) -> Order {
    let mut order = order(order_uid);
    order.items = (0..count as i64).map(|i| item(9_934_930 + i)).collect();
    order
}

/// A valid line item
pub fn item(chrt_id: i64) -> Item {
    Item {
        chrt_id,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: format!("ab4219087a764ae0b{chrt_id}"),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2_389_212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}
