//! Voucher API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::models::{Voucher, VoucherIds, VoucherUpdate};

use crate::core::ServerState;
use crate::inventory::{self, ResendSummary};
use crate::utils::{ApiResponse, AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub force: bool,
}

/// Bulk delete result
#[derive(Debug, Serialize)]
pub struct DeleteSummary {
    pub requested: usize,
    pub deleted: u64,
}

/// Correct the code of an available voucher
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<VoucherUpdate>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let voucher = inventory::edit_code(&state.pool, id, &payload.code).await?;
    tracing::info!(voucher_id = id, "Voucher code updated");
    Ok(Json(ApiResponse::success(voucher)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let voucher = inventory::delete(&state.pool, id, query.force).await?;
    Ok(Json(ApiResponse::success(voucher)))
}

pub async fn delete_many(
    State(state): State<ServerState>,
    Json(payload): Json<VoucherIds>,
) -> AppResult<Json<ApiResponse<DeleteSummary>>> {
    let ids = non_empty(payload)?;
    let deleted = inventory::delete_available(&state.pool, &ids).await?;
    Ok(Json(ApiResponse::success_with_message(
        format!("Deleted {deleted} of {} vouchers", ids.len()),
        DeleteSummary {
            requested: ids.len(),
            deleted,
        },
    )))
}

/// Send one allocated voucher to its customer again
pub async fn resend(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let voucher = inventory::resend_one(
        &state.pool,
        state.notifier.as_ref(),
        &state.config.store_name,
        id,
    )
    .await?;
    Ok(Json(ApiResponse::success(voucher)))
}

pub async fn resend_many(
    State(state): State<ServerState>,
    Json(payload): Json<VoucherIds>,
) -> AppResult<Json<ApiResponse<ResendSummary>>> {
    let ids = non_empty(payload)?;
    let summary = inventory::resend(
        &state.pool,
        state.notifier.as_ref(),
        &state.config.store_name,
        &ids,
    )
    .await?;
    Ok(Json(ApiResponse::success_with_message(
        format!(
            "Resent to {} of {} customers",
            summary.succeeded, summary.groups
        ),
        summary,
    )))
}

fn non_empty(payload: VoucherIds) -> AppResult<Vec<i64>> {
    if payload.ids.is_empty() {
        return Err(AppError::validation("No voucher ids given"));
    }
    Ok(payload.ids)
}
