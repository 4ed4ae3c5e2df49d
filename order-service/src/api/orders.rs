//! Order lookup and create endpoints

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::StatusCode;
use serde::Serialize;
use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
use shared::models::Order;

use crate::core::AppState;
use crate::error::OrderError;

#[derive(Debug, Serialize)]
pub struct Created {
    pub order_uid: String,
}

/// GET /order/{uid}
///
/// Only not-found and a blank id are reported as such; any other failure is
/// a generic server error.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    match state.orders.get(&order_uid, &state.abort).await {
        Ok(order) => Ok(ApiResponse::success(order)),
        Err(err @ OrderError::Validation(_)) => Err(err.into()),
        Err(err) if err.is_not_found() => Err(AppError::order_not_found(order_uid)),
        Err(err) => {
            tracing::error!(order_uid = %order_uid, error = %err, "Order lookup failed");
            Err(AppError::new(ErrorCode::InternalError))
        }
    }
}

/// POST /order
pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<Order>, JsonRejection>,
) -> AppResult<(StatusCode, ApiResponse<Created>)> {
    let Json(order) = body.map_err(|e| AppError::invalid_format(e.body_text()))?;
    let order_uid = order.order_uid.clone();

    state.orders.create(order, &state.abort).await?;

    Ok((StatusCode::CREATED, ApiResponse::success(Created { order_uid })))
}
