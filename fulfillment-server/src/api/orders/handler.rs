//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{Order, OrderDetail, OrderStatus};

use crate::core::ServerState;
use crate::db::repository::{RepoError, order as order_repo, voucher as voucher_repo};
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode};

/// Query params for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// List orders, newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let orders = order_repo::find_all(&state.pool, query.status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get order by marketplace order number
pub async fn get_by_number(
    State(state): State<ServerState>,
    Path(number): Path<String>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = order_repo::find_by_number(&state.pool, &number)
        .await?
        .ok_or_else(|| order_not_found(&number))?;
    let vouchers = voucher_repo::find_by_order(&state.pool, &number).await?;
    Ok(Json(ApiResponse::success(OrderDetail { order, vouchers })))
}

/// Return an `error` order to `pending`
pub async fn reset(
    State(state): State<ServerState>,
    Path(number): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_repo::reset(&state.pool, &number)
        .await
        .map_err(|e| match e {
            RepoError::NotFound(_) => order_not_found(&number),
            RepoError::Conflict(msg) => AppError::with_message(ErrorCode::OrderNotResettable, msg),
            other => other.into(),
        })?;
    tracing::info!(order = %number, "Order reset to pending");
    Ok(Json(ApiResponse::success(order)))
}

fn order_not_found(number: &str) -> AppError {
    AppError::with_message(ErrorCode::OrderNotFound, format!("Order {number} not found"))
}
