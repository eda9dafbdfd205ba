//! Marketplace status reconciliation
//!
//! Runs after the local commit and never undoes it. Orders the marketplace
//! did not acknowledge keep `reconciled = false` and are retried by later
//! processing runs.

use shared::models::Order;

use super::PipelineContext;
use crate::db::repository::order as order_repo;

/// Completed orders re-sent to the marketplace per processing run
pub const RECONCILE_BATCH: i64 = 20;

/// Report one completed order as dispatched
pub async fn reconcile(ctx: &PipelineContext, order: &Order) -> bool {
    if !ctx.source.mark_dispatched(&order.order_number).await {
        tracing::warn!(order = %order.order_number, "Dispatch not acknowledged, will retry");
        return false;
    }
    if let Err(e) = order_repo::mark_reconciled(&ctx.pool, order.id).await {
        tracing::error!(order = %order.order_number, error = %e, "Failed to record reconciliation");
        return false;
    }
    true
}

/// Retry reconciliation for earlier completed orders, returns how many succeeded
pub async fn retry_unreconciled(ctx: &PipelineContext, limit: i64) -> usize {
    let orders = match order_repo::find_unreconciled(&ctx.pool, limit).await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load unreconciled orders");
            return 0;
        }
    };

    let mut reconciled = 0;
    for order in &orders {
        if reconcile(ctx, order).await {
            reconciled += 1;
        }
    }
    if !orders.is_empty() {
        tracing::info!(
            pending = orders.len(),
            reconciled,
            "Retried marketplace reconciliation"
        );
    }
    reconciled
}
