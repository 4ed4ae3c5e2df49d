//! Data models
//!
//! Shared between the service, its tests and the order generator.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.

pub mod order;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-exports
pub use order::*;
