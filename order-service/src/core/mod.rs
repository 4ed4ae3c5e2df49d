//! Core infrastructure: configuration, shared state, background tasks

pub mod config;
pub mod state;
pub mod tasks;

pub use config::{Config, ConfigError, MEMORY_STORE_URL};
pub use state::AppState;
pub use tasks::{BackgroundTasks, TaskKind};
