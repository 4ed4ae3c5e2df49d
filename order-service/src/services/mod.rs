//! Business services

pub mod order_service;
pub mod order_validator;

pub use order_service::{OrderService, WarmupReport};
pub use order_validator::{OrderValidator, SchemaValidator};
