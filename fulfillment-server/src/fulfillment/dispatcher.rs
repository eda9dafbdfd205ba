//! Order allocation and dispatch
//!
//! Each pending order goes through:
//!
//! ```text
//! resolve product ─► count already allocated ─► select remainder (read only)
//!                          │                          │
//!                          │ none left                │ short
//!                          ▼                          ▼
//!                    mark completed                 error
//!                                                     │ enough
//!                                                     ▼
//!                       notify ─► BEGIN ─► claim vouchers + completed ─► COMMIT
//!                         │                     │
//!                         │ total failure       └─ claim lost ─► ROLLBACK, error
//!                         ▼
//!                       error
//! ```
//!
//! No write lock is held while the gateway is called. Claims are guarded on
//! availability and on the payload that was sent, so a voucher edited or
//! taken during delivery is never recorded against this order. Runs are
//! serialized by [`super::FulfillmentRunner`].

use serde::Serialize;
use shared::models::Order;
use tokio_util::sync::CancellationToken;

use super::PipelineContext;
use super::delivery::{Delivery, deliver};
use super::matcher::resolve_product;
use super::reconciler::{RECONCILE_BATCH, reconcile, retry_unreconciled};
use crate::db::repository::{
    RepoResult, order as order_repo, product as product_repo, voucher as voucher_repo,
};
use crate::messaging::normalize_phone;

/// Result of one processing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub message: String,
    /// Pending orders handled in this run
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Orders acknowledged by the marketplace in this run
    pub reconciled: usize,
}

enum OrderResult {
    Completed { reconciled: bool },
    Failed,
}

/// Process every pending order, oldest first
///
/// `cancel` is checked between orders; an order in progress always finishes.
pub async fn process_pending_orders(
    ctx: &PipelineContext,
    cancel: &CancellationToken,
) -> ProcessOutcome {
    let mut outcome = ProcessOutcome {
        success: true,
        ..Default::default()
    };

    outcome.reconciled += retry_unreconciled(ctx, RECONCILE_BATCH).await;

    let pending = match order_repo::find_pending(&ctx.pool).await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load pending orders");
            outcome.success = false;
            outcome.message = format!("Failed to load pending orders: {e}");
            return outcome;
        }
    };

    for order in &pending {
        if cancel.is_cancelled() {
            tracing::info!(
                remaining = pending.len() - outcome.processed,
                "Processing stopped before next order"
            );
            break;
        }
        outcome.processed += 1;

        match process_order(ctx, order).await {
            Ok(OrderResult::Completed { reconciled }) => {
                outcome.completed += 1;
                if reconciled {
                    outcome.reconciled += 1;
                }
            }
            Ok(OrderResult::Failed) => outcome.failed += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::error!(order = %order.order_number, error = %e, "Order processing error");
                let note = format!("processing error: {e}");
                if let Err(e) = order_repo::mark_error(&ctx.pool, order.id, &note).await {
                    tracing::error!(order = %order.order_number, error = %e, "Failed to mark order error");
                }
            }
        }
    }

    outcome.message = format!(
        "Processed {} orders: {} completed, {} failed",
        outcome.processed, outcome.completed, outcome.failed
    );
    if outcome.processed > 0 {
        tracing::info!(
            processed = outcome.processed,
            completed = outcome.completed,
            failed = outcome.failed,
            reconciled = outcome.reconciled,
            "Processing run finished"
        );
    }
    outcome
}

/// Record a data-integrity failure on the order
async fn fail(ctx: &PipelineContext, order: &Order, note: &str) -> RepoResult<OrderResult> {
    tracing::warn!(order = %order.order_number, reason = %note, "Order marked as error");
    order_repo::mark_error(&ctx.pool, order.id, note).await?;
    Ok(OrderResult::Failed)
}

async fn process_order(ctx: &PipelineContext, order: &Order) -> RepoResult<OrderResult> {
    if normalize_phone(&order.customer_phone).is_empty() {
        return fail(ctx, order, "missing customer phone").await;
    }

    let products = product_repo::find_active(&ctx.pool).await?;
    let Some(product) = resolve_product(&products, &order.product_name) else {
        let note = format!("product not found: {}", order.product_name);
        return fail(ctx, order, &note).await;
    };

    let mut conn = ctx.pool.acquire().await?;
    let allocated = voucher_repo::count_by_order(&mut conn, &order.order_number).await?;
    let remaining = order.quantity - allocated;
    if remaining <= 0 {
        order_repo::mark_completed(&mut conn, order.id).await?;
        drop(conn);
        tracing::info!(
            order = %order.order_number,
            allocated,
            "Order already fully allocated, marked completed"
        );
        let reconciled = reconcile(ctx, order).await;
        return Ok(OrderResult::Completed { reconciled });
    }

    let selected = voucher_repo::find_available(&mut conn, product.id, remaining).await?;
    drop(conn);
    if (selected.len() as i64) < remaining {
        let note = format!(
            "insufficient inventory (needed {remaining}, available {})",
            selected.len()
        );
        return fail(ctx, order, &note).await;
    }

    let delivery = Delivery {
        store_name: &ctx.store_name,
        customer_name: &order.customer_name,
        customer_phone: &order.customer_phone,
        product_name: &order.product_name,
        order_number: &order.order_number,
    };
    let sent = deliver(ctx.notifier.as_ref(), delivery, &selected).await;

    if !sent.is_success() {
        return fail(ctx, order, "notification failed").await;
    }
    if sent.is_partial() {
        tracing::warn!(
            order = %order.order_number,
            attempted = sent.attempted,
            succeeded = sent.succeeded,
            "Some messages failed, order still completed"
        );
    }

    let mut tx = ctx.pool.begin().await?;
    for voucher in &selected {
        let claimed = voucher_repo::allocate(
            &mut tx,
            voucher,
            &order.order_number,
            &order.customer_name,
            &order.customer_phone,
        )
        .await?;
        if !claimed {
            tx.rollback().await?;
            tracing::error!(
                order = %order.order_number,
                voucher_id = voucher.id,
                "Voucher changed during delivery, allocation rolled back"
            );
            let note = format!("voucher {} changed during delivery", voucher.id);
            return fail(ctx, order, &note).await;
        }
    }
    if let Err(e) = order_repo::mark_completed(&mut tx, order.id).await {
        tx.rollback().await?;
        return Err(e);
    }
    tx.commit().await?;
    tracing::info!(
        order = %order.order_number,
        product_id = product.id,
        vouchers = selected.len(),
        "Order fulfilled"
    );

    let reconciled = reconcile(ctx, order).await;
    Ok(OrderResult::Completed { reconciled })
}
