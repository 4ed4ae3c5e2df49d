//! Field-level order validation

use shared::models::Order;
use validator::{Validate, ValidationErrors};

/// Validation seam used by the orchestrator before any I/O
pub trait OrderValidator: Send + Sync {
    fn validate(&self, order: &Order) -> Result<(), ValidationErrors>;
}

/// Applies the rules declared on the model with `#[validate(...)]`
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl OrderValidator for SchemaValidator {
    fn validate(&self, order: &Order) -> Result<(), ValidationErrors> {
        Validate::validate(order)
    }
}
