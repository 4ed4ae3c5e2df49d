//! Order aggregate: order header + delivery + payment + items
//!
//! JSON field names are the column names of the `orders`, `delivery`,
//! `payment` and `items` tables, so the inbound message, the HTTP body and
//! the persisted rows share one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Reject empty and whitespace-only identifiers.
///
/// Applied to `order_uid` on create and to the id of a lookup, so every
/// stored order can be read back.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("order_uid must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Order aggregate root, identified by `order_uid`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    #[validate(custom(function = "not_blank"))]
    pub order_uid: String,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(length(min = 1))]
    pub entry: String,

    // -- Relations (populated by the store, skipped by FromRow) --
    #[validate(nested)]
    #[cfg_attr(feature = "db", sqlx(skip))]
    pub delivery: Delivery,
    #[validate(nested)]
    #[cfg_attr(feature = "db", sqlx(skip))]
    pub payment: Payment,
    /// Line items in insertion order
    #[validate(length(min = 1), nested)]
    #[cfg_attr(feature = "db", sqlx(skip))]
    pub items: Vec<Item>,

    #[validate(length(min = 1))]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[validate(range(min = 0))]
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub oof_shard: String,
}

/// Delivery block (1:1 with the order)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Delivery {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(length(min = 1))]
    pub email: String,
}

/// Payment block (1:1 with the order)
///
/// Money amounts are integer minor units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Payment {
    #[validate(length(min = 1))]
    pub transaction: String,
    #[validate(length(min = 1))]
    pub request_id: String,
    /// ISO 4217 alphabetic code
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(range(min = 0))]
    pub amount: i64,
    /// Unix seconds
    #[validate(range(min = 0))]
    pub payment_dt: i64,
    #[validate(length(min = 1))]
    pub bank: String,
    #[validate(range(min = 0))]
    pub delivery_cost: i64,
    #[validate(range(min = 0))]
    pub goods_total: i64,
    #[validate(range(min = 0))]
    pub custom_fee: i64,
}

/// Order line item
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Item {
    #[validate(range(min = 0))]
    pub chrt_id: i64,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(length(min = 1))]
    pub rid: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0))]
    pub sale: i64,
    #[validate(length(min = 1))]
    pub size: String,
    #[validate(range(min = 0))]
    pub total_price: i64,
    #[validate(range(min = 0))]
    pub nm_id: i64,
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(range(min = 0))]
    pub status: i64,
}
