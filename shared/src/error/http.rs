//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::OrderNotFound => StatusCode::NOT_FOUND,

            Self::OrderAlreadyExists => StatusCode::CONFLICT,

            // Transient errors, client can retry
            Self::SystemBusy | Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,

            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ValidationFailed | Self::InvalidFormat => StatusCode::BAD_REQUEST,
        }
    }
}
