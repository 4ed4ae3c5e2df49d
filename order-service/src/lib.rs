//! order-service: order ingestion and lookup
//!
//! Orders arrive as JSON messages, are validated, persisted in one
//! transaction across four tables, and cached. Lookups read the bounded FIFO
//! cache first and fall back to the store.
//!
//! # Module layout
//!
//! - [`cache`] - bounded FIFO cache
//! - [`db`] - transactional order store (PostgreSQL, in-memory)
//! - [`services`] - order orchestrator and validation
//! - [`ingest`] - ingestion adapter and TCP transport
//! - [`api`] - HTTP routes
//! - [`core`](crate::core) - configuration, shared state, background tasks

pub mod api;
pub mod cache;
pub mod core;
pub mod db;
pub mod error;
pub mod ingest;
pub mod services;
pub mod utils;

pub use crate::core::{AppState, Config};
pub use error::{OrderError, OrderResult};
pub use services::OrderService;
