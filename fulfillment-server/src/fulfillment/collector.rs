//! Order collection

use serde::Serialize;

use super::PipelineContext;
use crate::db::repository::order as order_repo;

/// Result of one collection
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectOutcome {
    pub success: bool,
    pub message: String,
    /// Orders returned by the marketplace
    pub fetched: usize,
    /// Orders not seen before, now stored as `pending`
    pub new_orders: usize,
}

impl CollectOutcome {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            ..Default::default()
        }
    }
}

/// Fetch recent orders and store the unseen ones as `pending`
///
/// Best effort: a marketplace failure yields an unsuccessful outcome with
/// zero new orders and is retried by the next run.
pub async fn collect(ctx: &PipelineContext) -> CollectOutcome {
    let orders = match ctx.source.fetch_recent_orders().await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!(error = %e, "Order collection failed");
            return CollectOutcome::failure(format!("Order collection failed: {e}"));
        }
    };

    let mut new_orders = 0;
    let mut errors = 0;
    for order in &orders {
        if order.order_number.trim().is_empty() {
            continue;
        }
        match order_repo::insert_if_absent(&ctx.pool, order).await {
            Ok(true) => {
                new_orders += 1;
                tracing::info!(
                    order = %order.order_number,
                    product = %order.product_name,
                    quantity = order.quantity,
                    "New order collected"
                );
            }
            Ok(false) => {}
            Err(e) => {
                errors += 1;
                tracing::error!(order = %order.order_number, error = %e, "Failed to store order");
            }
        }
    }

    let mut message = format!("Collected {new_orders} new orders ({} fetched)", orders.len());
    if errors > 0 {
        message.push_str(&format!(", {errors} could not be stored"));
    }
    tracing::info!(fetched = orders.len(), new_orders, errors, "Order collection finished");

    CollectOutcome {
        success: errors == 0,
        message,
        fetched: orders.len(),
        new_orders,
    }
}
