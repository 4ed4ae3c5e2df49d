//! Shared types for the order service
//!
//! The order aggregate model and the error/response vocabulary used by the
//! HTTP surface.

pub mod error;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};
