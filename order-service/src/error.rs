//! Orchestrator error type and its mapping onto the HTTP error vocabulary
//!
//! `OrderError` carries exactly two kinds: validation failures raised before
//! any I/O, and store failures passed through unchanged. Each boundary decides
//! how tolerant it is (the ingestion adapter acks conflicts, HTTP answers 409).

use shared::error::{AppError, ErrorCode};
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

use crate::db::StoreError;

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Validation failure for the `order_uid` argument of a lookup
    pub fn invalid_id(error: ValidationError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("order_uid", error);
        OrderError::Validation(errors)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderError::Store(StoreError::Conflict(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderError::Store(StoreError::NotFound(_)))
    }

    /// Same answer as [`StoreError::is_retryable`]; validation failures never are
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Store(err) => err.is_retryable(),
            OrderError::Validation(_) => false,
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(errors) => AppError::from(errors),
            OrderError::Store(StoreError::NotFound(order_uid)) => {
                AppError::order_not_found(order_uid)
            }
            OrderError::Store(StoreError::Conflict(order_uid)) => {
                AppError::order_conflict(order_uid)
            }
            OrderError::Store(err @ StoreError::Transient(_)) => {
                tracing::warn!(error = %err, "Store unavailable");
                AppError::busy("Order store temporarily unavailable, retry later")
            }
            OrderError::Store(StoreError::Cancelled) => {
                tracing::warn!("Order operation cancelled by shutdown");
                AppError::new(ErrorCode::Cancelled)
            }
            OrderError::Store(err @ StoreError::Fatal(_)) => {
                tracing::error!(error = %err, "Order store failure");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

/// Result type for orchestrator operations
pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_invalid_id_is_validation() {
        let err = OrderError::invalid_id(ValidationError::new("required"));
        assert!(matches!(err, OrderError::Validation(_)));
        assert!(!err.is_retryable());

        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::ValidationFailed);
        assert_eq!(app.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_errors_map_to_http() {
        let cases = [
            (StoreError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (StoreError::Conflict("a".into()), StatusCode::CONFLICT),
            (StoreError::Transient("io".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Fatal("bad sql".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (store_err, status) in cases {
            let app: AppError = OrderError::from(store_err).into();
            assert_eq!(app.http_status(), status);
        }
    }

    #[test]
    fn test_fatal_does_not_leak_details() {
        let app: AppError =
            OrderError::from(StoreError::Fatal("relation \"orders\" does not exist".into())).into();
        assert_eq!(app.code, ErrorCode::InternalError);
        assert!(!app.message.contains("relation"));
        assert!(app.details.is_none());
    }

    #[test]
    fn test_classification_helpers() {
        assert!(OrderError::from(StoreError::Conflict("a".into())).is_conflict());
        assert!(OrderError::from(StoreError::NotFound("a".into())).is_not_found());
        assert!(OrderError::from(StoreError::Transient("a".into())).is_retryable());
        assert!(!OrderError::from(StoreError::Fatal("a".into())).is_retryable());
    }

    #[test]
    fn test_retryable_agrees_with_store_error() {
        let cases = [
            StoreError::Conflict("a".into()),
            StoreError::NotFound("a".into()),
            StoreError::Transient("a".into()),
            StoreError::Fatal("a".into()),
            StoreError::Cancelled,
        ];
        for store_err in cases {
            let expected = store_err.is_retryable();
            assert_eq!(OrderError::from(store_err).is_retryable(), expected);
        }
    }

    #[test]
    fn test_cancelled_maps_to_cancelled_code() {
        let app: AppError = OrderError::from(StoreError::Cancelled).into();
        assert_eq!(app.code, ErrorCode::Cancelled);
        assert_eq!(app.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
